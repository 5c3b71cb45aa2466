// ============================================================================
// IMAGE FILTERS — box blur
// ============================================================================

use rayon::prelude::*;

use crate::canvas::PixelBuffer;

/// Square box blur of the RGB channels over a `(2r+1)^2` window.
///
/// Reads from the untouched source so neighbouring writes never feed back.
/// Pixels closer than `radius` to any edge are copied through unchanged, and
/// alpha is never modified.
pub fn box_blur(src: &PixelBuffer, radius: u32) -> PixelBuffer {
    src.assert_consistent();
    let r = radius as usize;
    let w = src.width() as usize;
    let h = src.height() as usize;
    if r == 0 || w <= 2 * r || h <= 2 * r {
        return src.clone();
    }

    let stride = src.stride();
    let src_raw = src.as_raw();
    let mut dst_raw = src_raw.to_vec();
    let side = 2 * r + 1;
    let count = (side * side) as u32;

    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        if y < r || y >= h - r {
            return;
        }
        for x in r..w - r {
            let mut sum = [0u32; 3];
            for sy in y - r..=y + r {
                let row = &src_raw[sy * stride + (x - r) * 4..sy * stride + (x + r + 1) * 4];
                for px in row.chunks_exact(4) {
                    sum[0] += px[0] as u32;
                    sum[1] += px[1] as u32;
                    sum[2] += px[2] as u32;
                }
            }
            let pi = x * 4;
            row_out[pi] = ((sum[0] + count / 2) / count) as u8;
            row_out[pi + 1] = ((sum[1] + count / 2) / count) as u8;
            row_out[pi + 2] = ((sum[2] + count / 2) / count) as u8;
        }
    });

    PixelBuffer::from_parts(src.width(), src.height(), dst_raw)
}
