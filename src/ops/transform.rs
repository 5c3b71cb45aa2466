// ============================================================================
// TRANSFORMS — export resampling and fit-on-load scaling
// ============================================================================

use image::imageops::{self, FilterType};
use rayon::prelude::*;

use crate::canvas::PixelBuffer;
use crate::error::{PixelError, Result};

/// Largest export, in pixels (256 MiB of RGBA).
pub const MAX_EXPORT_PIXELS: u64 = 1 << 26;

/// Nearest-neighbour resample for export.
///
/// The result is exactly `round(width * scale) x round(height * scale)`.
/// Integer scales replicate each source pixel into a solid square, so pixel
/// art stays crisp. Results above [`MAX_EXPORT_PIXELS`] are refused before
/// anything is allocated.
pub fn export_buffer(src: &PixelBuffer, scale: f64) -> Result<PixelBuffer> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(PixelError::invalid("scale", format!("must be > 0, got {}", scale)));
    }
    src.assert_consistent();

    let out_w = scaled_dim(src.width(), scale)?;
    let out_h = scaled_dim(src.height(), scale)?;
    if out_w as u64 * out_h as u64 > MAX_EXPORT_PIXELS {
        return Err(PixelError::invalid(
            "scale",
            format!("{} gives a {}x{} export, over the {} pixel limit", scale, out_w, out_h, MAX_EXPORT_PIXELS),
        ));
    }
    if (out_w, out_h) == (src.width(), src.height()) {
        return Ok(src.clone());
    }
    let mut dst_raw = vec![0u8; out_w as usize * out_h as usize * 4];
    if src.is_empty() || out_w == 0 || out_h == 0 {
        return Ok(PixelBuffer::from_parts(out_w, out_h, dst_raw));
    }

    let (sw, sh) = (src.width() as u64, src.height() as u64);
    let src_stride = src.stride();
    let src_raw = src.as_raw();
    // Source column per output column, shared by every row.
    let x_map: Vec<usize> = (0..out_w as u64)
        .map(|x| (x * sw / out_w as u64) as usize * 4)
        .collect();

    dst_raw
        .par_chunks_mut(out_w as usize * 4)
        .enumerate()
        .for_each(|(y, row_out)| {
            let sy = (y as u64 * sh / out_h as u64) as usize;
            let row_in = &src_raw[sy * src_stride..(sy + 1) * src_stride];
            for (x, &si) in x_map.iter().enumerate() {
                row_out[x * 4..x * 4 + 4].copy_from_slice(&row_in[si..si + 4]);
            }
        });

    Ok(PixelBuffer::from_parts(out_w, out_h, dst_raw))
}

/// Shrink `src` to fit inside `max_w x max_h`, keeping the aspect ratio.
/// Buffers that already fit are returned unchanged; nothing is enlarged.
pub fn fit_within(src: &PixelBuffer, max_w: u32, max_h: u32) -> PixelBuffer {
    src.assert_consistent();
    let (w, h) = (src.width(), src.height());
    if src.is_empty() || (w <= max_w && h <= max_h) {
        return src.clone();
    }
    let ratio = (max_w as f64 / w as f64).min(max_h as f64 / h as f64);
    let new_w = ((w as f64 * ratio) as u32).max(1);
    let new_h = ((h as f64 * ratio) as u32).max(1);
    let resized = imageops::resize(&src.to_rgba_image(), new_w, new_h, FilterType::Triangle);
    PixelBuffer::from_rgba_image(&resized)
}

fn scaled_dim(len: u32, scale: f64) -> Result<u32> {
    let v = (len as f64 * scale).round();
    if v > u32::MAX as f64 {
        return Err(PixelError::invalid("scale", format!("{} overflows the output size", scale)));
    }
    Ok(v as u32)
}
