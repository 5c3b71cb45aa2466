// ============================================================================
// DENOISE — greedy palette quantization followed by an optional box blur
// ============================================================================
//
// Quantization is first-match greedy, not clustering: pixels are visited in
// row-major order and snap to the first palette entry closer than the
// tolerance radius. Unmatched pixels seed new palette entries until the
// palette is full; after that they pass through unchanged. Earlier pixels are
// never revisited when the palette grows.

use crate::canvas::PixelBuffer;
use crate::ops::filters::box_blur;

/// Percent-to-channel factor: tolerance 100 covers a 255-unit radius.
const TOLERANCE_SCALE: f64 = 2.55;

/// Parameters for [`denoise`]. Percentages are in `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DenoiseParams {
    pub strength: u32,
    pub tolerance: u32,
    pub max_colors: u32,
}

/// What the quantization pass saw.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QuantizeReport {
    /// Palette in insertion order.
    pub palette: Vec<[u8; 3]>,
    /// Pixels left as-is because nothing matched and the palette was full.
    pub unmatched: usize,
}

/// Blur radius for a denoise strength: `strength / 25 + 1`
/// (1-24 -> 1, 25-49 -> 2, 50-74 -> 3, 75-99 -> 4, 100 -> 5).
pub fn blur_radius(strength: u32) -> u32 {
    strength / 25 + 1
}

/// Quantize, then blur when `strength > 0`.
pub fn denoise(src: &PixelBuffer, params: DenoiseParams) -> PixelBuffer {
    let (quantized, _) = quantize(src, params.tolerance, params.max_colors);
    if params.strength > 0 {
        box_blur(&quantized, blur_radius(params.strength))
    } else {
        quantized
    }
}

/// Greedy first-match colour quantization of the RGB channels.
///
/// A pixel matches a palette entry when their RGB Euclidean distance is
/// strictly below `tolerance * 2.55`. Alpha is never changed.
pub fn quantize(src: &PixelBuffer, tolerance: u32, max_colors: u32) -> (PixelBuffer, QuantizeReport) {
    src.assert_consistent();
    let radius = tolerance as f64 * TOLERANCE_SCALE;
    let radius_sq = radius * radius;
    let max_colors = max_colors.max(1) as usize;

    let mut data = src.as_raw().to_vec();
    let mut report = QuantizeReport {
        palette: Vec::with_capacity(max_colors.min(256)),
        unmatched: 0,
    };

    for px in data.chunks_exact_mut(4) {
        let rgb = [px[0], px[1], px[2]];
        let hit = report
            .palette
            .iter()
            .find(|entry| distance_sq(rgb, **entry) < radius_sq)
            .copied();
        match hit {
            Some(entry) => px[..3].copy_from_slice(&entry),
            None if report.palette.len() < max_colors => {
                // At zero tolerance an exact repeat never matches; keep the palette a set.
                if !report.palette.contains(&rgb) {
                    report.palette.push(rgb);
                }
            }
            None => report.unmatched += 1,
        }
    }

    (PixelBuffer::from_parts(src.width(), src.height(), data), report)
}

#[inline]
fn distance_sq(a: [u8; 3], b: [u8; 3]) -> f64 {
    let dr = a[0] as f64 - b[0] as f64;
    let dg = a[1] as f64 - b[1] as f64;
    let db = a[2] as f64 - b[2] as f64;
    dr * dr + dg * dg + db * db
}
