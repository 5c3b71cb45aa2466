// ============================================================================
// GRID OPERATIONS — block-average alignment and downsampling
// ============================================================================
//
// Both operations average the pixels of a rectangular cell into one colour.
// `align` keeps the canvas size and paints the average back over the cell;
// `downsample` and `downsample_by_block` emit one output pixel per cell,
// shrinking the canvas. Partial cells at the right/bottom edge average only
// the pixels they contain, so `downsample_by_block(bs)` matches `align(bs)`
// cell for cell.

use rayon::prelude::*;

use crate::canvas::PixelBuffer;

/// Block-average `src` on a fixed `block_size` grid. Same dimensions out.
/// `block_size` 0 is treated as 1 (identity).
pub fn align(src: &PixelBuffer, block_size: u32) -> PixelBuffer {
    src.assert_consistent();
    let bs = block_size.max(1) as usize;
    if src.is_empty() || bs == 1 {
        return src.clone();
    }

    let w = src.width() as usize;
    let h = src.height() as usize;
    let stride = src.stride();
    let src_raw = src.as_raw();
    let mut dst_raw = vec![0u8; src_raw.len()];

    // One band = one row of blocks; bands are independent.
    dst_raw
        .par_chunks_mut(stride * bs)
        .enumerate()
        .for_each(|(band, band_out)| {
            let y0 = band * bs;
            let y1 = (y0 + bs).min(h);
            let mut x0 = 0;
            while x0 < w {
                let x1 = (x0 + bs).min(w);
                let avg = cell_mean(src_raw, stride, x0, x1, y0, y1);
                for y in y0..y1 {
                    let row = (y - y0) * stride;
                    for x in x0..x1 {
                        let pi = row + x * 4;
                        band_out[pi..pi + 4].copy_from_slice(&avg);
                    }
                }
                x0 = x1;
            }
        });

    PixelBuffer::from_parts(src.width(), src.height(), dst_raw)
}

/// Average `src` down to exactly `cols x rows` pixels.
///
/// Each axis uses the block width `bw = ceil(len / cells)` when that grid has
/// exactly `cells` blocks, giving cells `[i*bw, min((i+1)*bw, len))` like
/// `align`. Otherwise the axis is split evenly into
/// `[i*len/cells, (i+1)*len/cells)`, widened to one source pixel when there
/// are more cells than pixels.
/// An empty source yields a transparent `cols x rows` buffer.
pub fn downsample(src: &PixelBuffer, cols: u32, rows: u32) -> PixelBuffer {
    src.assert_consistent();
    let cols = cols.max(1);
    let rows = rows.max(1);
    if src.is_empty() {
        return PixelBuffer::new(cols, rows);
    }
    let x_spans = cell_spans(src.width() as usize, cols as usize);
    let y_spans = cell_spans(src.height() as usize, rows as usize);
    average_cells(src, &x_spans, &y_spans)
}

/// One output pixel per `align(block_size)` block, so pixel `(cx, cy)` equals
/// `align(src, block_size)` at `(cx * block_size, cy * block_size)`.
/// Output size is [`grid_dimensions`].
pub fn downsample_by_block(src: &PixelBuffer, block_size: u32) -> PixelBuffer {
    src.assert_consistent();
    let bs = block_size.max(1) as usize;
    if src.is_empty() {
        return src.clone();
    }
    let x_spans = block_spans(src.width() as usize, bs);
    let y_spans = block_spans(src.height() as usize, bs);
    average_cells(src, &x_spans, &y_spans)
}

fn average_cells(src: &PixelBuffer, x_spans: &[(usize, usize)], y_spans: &[(usize, usize)]) -> PixelBuffer {
    let out_stride = x_spans.len() * 4;
    let mut dst_raw = vec![0u8; out_stride * y_spans.len()];
    let stride = src.stride();
    let src_raw = src.as_raw();

    dst_raw
        .par_chunks_mut(out_stride)
        .enumerate()
        .for_each(|(cy, row_out)| {
            let (y0, y1) = y_spans[cy];
            for (cx, &(x0, x1)) in x_spans.iter().enumerate() {
                let avg = cell_mean(src_raw, stride, x0, x1, y0, y1);
                row_out[cx * 4..cx * 4 + 4].copy_from_slice(&avg);
            }
        });

    PixelBuffer::from_parts(x_spans.len() as u32, y_spans.len() as u32, dst_raw)
}

/// Grid size for a block size: `ceil(len / block_size)` per axis.
pub fn grid_dimensions(width: u32, height: u32, block_size: u32) -> (u32, u32) {
    let bs = block_size.max(1);
    (width.div_ceil(bs), height.div_ceil(bs))
}

fn block_spans(len: usize, bw: usize) -> Vec<(usize, usize)> {
    (0..len.div_ceil(bw)).map(|i| (i * bw, ((i + 1) * bw).min(len))).collect()
}

fn cell_spans(len: usize, cells: usize) -> Vec<(usize, usize)> {
    let bw = len.div_ceil(cells);
    if len.div_ceil(bw) == cells {
        return block_spans(len, bw);
    }
    (0..cells)
        .map(|i| {
            let start = (i * len / cells).min(len - 1);
            let end = ((i + 1) * len / cells).max(start + 1).min(len);
            (start, end)
        })
        .collect()
}

/// Per-channel mean over `[x0, x1) x [y0, y1)`, rounded half up.
fn cell_mean(raw: &[u8], stride: usize, x0: usize, x1: usize, y0: usize, y1: usize) -> [u8; 4] {
    let mut sum = [0u64; 4];
    for y in y0..y1 {
        let row = &raw[y * stride + x0 * 4..y * stride + x1 * 4];
        for px in row.chunks_exact(4) {
            sum[0] += px[0] as u64;
            sum[1] += px[1] as u64;
            sum[2] += px[2] as u64;
            sum[3] += px[3] as u64;
        }
    }
    let count = ((x1 - x0) * (y1 - y0)) as u64;
    if count == 0 {
        return [0; 4];
    }
    sum.map(|s| ((s + count / 2) / count) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// 4x4 buffer where every pixel has a distinct colour.
    fn distinct_4x4() -> PixelBuffer {
        let mut buf = PixelBuffer::new(4, 4);
        for y in 0..4u32 {
            for x in 0..4u32 {
                let i = (y * 4 + x) as u8;
                buf.put_pixel(x, y, Rgba([i * 10, 255 - i * 7, i * 3 + 1, 200 + i]));
            }
        }
        buf
    }

    #[test]
    fn quadrants_become_their_rounded_mean() {
        let src = distinct_4x4();
        let out = align(&src, 2);
        assert_eq!((out.width(), out.height()), (4, 4));

        let quad = [(0, 0), (1, 0), (0, 1), (1, 1)].map(|(x, y)| src.get_pixel(x, y));
        let expect: [u8; 4] = std::array::from_fn(|c| {
            let sum: u32 = quad.iter().map(|p| p[c] as u32).sum();
            (sum as f64 / 4.0).round() as u8
        });
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            assert_eq!(out.get_pixel(x, y).0, expect);
        }
        // Other quadrants are uniform too.
        assert_eq!(out.get_pixel(2, 2), out.get_pixel(3, 3));
        assert_ne!(out.get_pixel(0, 0), out.get_pixel(3, 3));
    }

    #[test]
    fn align_is_idempotent() {
        let src = distinct_4x4();
        for bs in 1..=5 {
            let once = align(&src, bs);
            assert_eq!(align(&once, bs), once, "block size {}", bs);
        }
    }

    #[test]
    fn partial_blocks_average_only_their_pixels() {
        // 3x1: with block size 2 the last block holds a single pixel.
        let mut src = PixelBuffer::new(3, 1);
        src.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        src.put_pixel(1, 0, Rgba([101, 0, 0, 255]));
        src.put_pixel(2, 0, Rgba([77, 1, 2, 3]));
        let out = align(&src, 2);
        // (0 + 101) / 2 = 50.5 rounds up.
        assert_eq!(out.get_pixel(0, 0), Rgba([51, 0, 0, 255]));
        assert_eq!(out.get_pixel(1, 0), Rgba([51, 0, 0, 255]));
        assert_eq!(out.get_pixel(2, 0), Rgba([77, 1, 2, 3]));
    }

    #[test]
    fn block_size_zero_and_one_are_identity() {
        let src = distinct_4x4();
        assert_eq!(align(&src, 0), src);
        assert_eq!(align(&src, 1), src);
        assert_eq!(downsample_by_block(&src, 1), src);
        let empty = PixelBuffer::new(0, 0);
        assert_eq!(align(&empty, 4), empty);
        assert_eq!(downsample_by_block(&empty, 4), empty);
    }

    #[test]
    fn downsample_emits_exact_grid() {
        let src = distinct_4x4();
        let out = downsample(&src, 2, 2);
        assert_eq!((out.width(), out.height()), (2, 2));
        assert_eq!(out.get_pixel(0, 0), align(&src, 2).get_pixel(0, 0));
        assert_eq!(out.get_pixel(1, 1), align(&src, 2).get_pixel(3, 3));

        for (c, r) in [(1, 1), (3, 3), (7, 2), (4, 9)] {
            let out = downsample(&src, c, r);
            assert_eq!(out.as_raw().len(), (c * r * 4) as usize);
        }
    }

    fn noisy(w: u32, h: u32, seed: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(w, h);
        let mut state = seed.wrapping_mul(2654435761).max(1);
        for y in 0..h {
            for x in 0..w {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                buf.put_pixel(x, y, Rgba(state.to_le_bytes()));
            }
        }
        buf
    }

    #[test]
    fn downsample_then_align_one_is_stable() {
        let src = noisy(100, 100, 5);
        let out = downsample(&src, 10, 10);
        assert_eq!((out.width(), out.height()), (10, 10));
        assert_eq!(align(&out, 1), out);
        // 100 / 10 divides evenly, so each cell is a 10x10 block mean.
        assert_eq!(out.get_pixel(3, 7), align(&src, 10).get_pixel(30, 70));
    }

    #[test]
    fn shrink_matches_align_on_partial_grids() {
        // 10 is not a multiple of 3: the last block column is one pixel wide.
        let mut ramp = PixelBuffer::new(10, 1);
        for x in 0..10u32 {
            ramp.put_pixel(x, 0, Rgba([(x * 20) as u8, 0, 0, 255]));
        }
        let (cols, rows) = grid_dimensions(10, 1, 3);
        let out = downsample(&ramp, cols, rows);
        let reds: Vec<u8> = (0..cols).map(|x| out.get_pixel(x, 0)[0]).collect();
        assert_eq!(reds, vec![20, 80, 140, 180]);

        for (w, h, bs) in [(10, 7, 3), (13, 5, 4), (20, 9, 8), (9, 9, 2)] {
            let src = noisy(w, h, w * h + bs);
            let (cols, rows) = grid_dimensions(w, h, bs);
            let small = downsample_by_block(&src, bs);
            assert_eq!((small.width(), small.height()), (cols, rows));
            let aligned = align(&src, bs);
            for cy in 0..rows {
                for cx in 0..cols {
                    assert_eq!(
                        small.get_pixel(cx, cy),
                        aligned.get_pixel(cx * bs, cy * bs),
                        "{}x{} block {} cell ({}, {})",
                        w, h, bs, cx, cy
                    );
                }
            }
        }

        // Where the cell count pins down the block width, both entry points agree.
        let src = noisy(10, 7, 1);
        assert_eq!(downsample(&src, 4, 3), downsample_by_block(&src, 3));
    }

    #[test]
    fn downsample_uneven_spans_cover_every_pixel() {
        assert_eq!(cell_spans(10, 4), vec![(0, 3), (3, 6), (6, 9), (9, 10)]);
        // No block width yields 4 cells over 5 pixels: even split.
        assert_eq!(cell_spans(5, 4), vec![(0, 1), (1, 2), (2, 3), (3, 5)]);
        // More cells than pixels: every cell still samples one pixel.
        assert_eq!(cell_spans(2, 4), vec![(0, 1), (0, 1), (1, 2), (1, 2)]);
    }

    #[test]
    fn grid_dimensions_round_up() {
        assert_eq!(grid_dimensions(10, 7, 3), (4, 3));
        assert_eq!(grid_dimensions(10, 7, 0), (10, 7));
    }
}
