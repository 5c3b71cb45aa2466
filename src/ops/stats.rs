// ============================================================================
// PROCESSING STATISTICS — colour counts and before/after reductions
// ============================================================================

use std::collections::HashSet;
use std::time::Duration;

use crate::canvas::PixelBuffer;

/// Number of distinct RGB values (alpha ignored).
pub fn distinct_colors(buf: &PixelBuffer) -> usize {
    buf.as_raw()
        .chunks_exact(4)
        .map(|px| [px[0], px[1], px[2]])
        .collect::<HashSet<_>>()
        .len()
}

/// Before/after figures for one operation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProcessStats {
    pub elapsed: Duration,
    pub colors_before: usize,
    pub colors_after: usize,
    pub pixels_before: usize,
    pub pixels_after: usize,
}

impl ProcessStats {
    pub fn measure(before: &PixelBuffer, after: &PixelBuffer, elapsed: Duration) -> Self {
        Self {
            elapsed,
            colors_before: distinct_colors(before),
            colors_after: distinct_colors(after),
            pixels_before: before.pixel_count(),
            pixels_after: after.pixel_count(),
        }
    }

    /// Share of distinct colours removed, in percent. Never negative.
    pub fn color_reduction_pct(&self) -> f64 {
        reduction_pct(self.colors_before, self.colors_after)
    }

    /// Share of pixels removed by downsampling, in percent.
    pub fn pixel_reduction_pct(&self) -> f64 {
        reduction_pct(self.pixels_before, self.pixels_after)
    }
}

impl std::fmt::Display for ProcessStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1}s, colors {} -> {} (-{:.0}%), pixels {} -> {} (-{:.0}%)",
            self.elapsed.as_secs_f64(),
            self.colors_before,
            self.colors_after,
            self.color_reduction_pct(),
            self.pixels_before,
            self.pixels_after,
            self.pixel_reduction_pct()
        )
    }
}

fn reduction_pct(before: usize, after: usize) -> f64 {
    if before == 0 || after >= before {
        return 0.0;
    }
    (before - after) as f64 * 100.0 / before as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn alpha_does_not_split_colors() {
        let mut buf = PixelBuffer::new_filled(3, 1, Rgba([1, 2, 3, 255]));
        buf.put_pixel(1, 0, Rgba([1, 2, 3, 0]));
        assert_eq!(distinct_colors(&buf), 1);
        buf.put_pixel(2, 0, Rgba([1, 2, 4, 0]));
        assert_eq!(distinct_colors(&buf), 2);
        assert_eq!(distinct_colors(&PixelBuffer::new(0, 0)), 0);
    }

    #[test]
    fn reductions() {
        let mut before = PixelBuffer::new(4, 1);
        for x in 0..4 {
            before.put_pixel(x, 0, Rgba([x as u8, 0, 0, 255]));
        }
        let after = PixelBuffer::new_filled(2, 1, Rgba([0, 0, 0, 255]));
        let stats = ProcessStats::measure(&before, &after, Duration::from_millis(1500));
        assert_eq!(stats.color_reduction_pct(), 75.0);
        assert_eq!(stats.pixel_reduction_pct(), 50.0);
        assert!(stats.to_string().starts_with("1.5s, colors 4 -> 1"));
        assert_eq!(reduction_pct(2, 5), 0.0);
    }
}
