use image::{Rgba, RgbaImage};

use crate::error::{PixelError, Result};

// ============================================================================
// PIXEL BUFFER — flat row-major RGBA storage
// ============================================================================

/// The image: `width * height` RGBA pixels, row-major, origin top-left.
///
/// The raw byte length always equals `width * height * 4`. Fields are private
/// so the only ways to build one are the checked constructors below.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl PixelBuffer {
    /// Fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; Self::byte_len(width, height)],
        }
    }

    pub fn new_filled(width: u32, height: u32, color: Rgba<u8>) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&color.0);
        }
        Self { width, height, pixels }
    }

    /// Wrap decoded RGBA bytes. Fails when the length disagrees with the dimensions.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = Self::byte_len(width, height);
        if pixels.len() != expected {
            return Err(PixelError::DimensionMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self { width, height, pixels })
    }

    /// Internal constructor for operation outputs. Panics on a length mismatch,
    /// which can only mean a bug in the operation that produced `pixels`.
    pub(crate) fn from_parts(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        let buf = Self { width, height, pixels };
        buf.assert_consistent();
        buf
    }

    pub fn from_rgba_image(src: &RgbaImage) -> Self {
        Self {
            width: src.width(),
            height: src.height(),
            pixels: src.as_raw().clone(),
        }
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        // Length is guaranteed by construction; fall back to a blank image otherwise.
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row.
    #[inline]
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.pixels
    }

    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        let i = self.index(x, y);
        Rgba([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, pixel: Rgba<u8>) {
        let i = self.index(x, y);
        self.pixels[i..i + 4].copy_from_slice(&pixel.0);
    }

    /// Fail fast on a buffer whose byte length drifted from its dimensions.
    /// Every processing operation calls this on entry.
    pub fn assert_consistent(&self) {
        let expected = Self::byte_len(self.width, self.height);
        assert_eq!(
            self.pixels.len(),
            expected,
            "pixel buffer corrupted: {}x{} needs {} bytes, has {}",
            self.width,
            self.height,
            expected,
            self.pixels.len()
        );
    }

    #[inline]
    fn index(&self, x: u32, y: u32) -> usize {
        assert!(
            x < self.width && y < self.height,
            "pixel ({}, {}) out of bounds for {}x{}",
            x,
            y,
            self.width,
            self.height
        );
        (y as usize * self.width as usize + x as usize) * 4
    }

    fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }
}

// ============================================================================
// VIEW TRANSFORM — pan / zoom / auto-fit, independent of pixel data
// ============================================================================

/// Snapshot-able view parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    /// Pan offset, applied before scaling, relative to the buffer origin.
    pub offset_x: f64,
    pub offset_y: f64,
    /// User zoom factor.
    pub zoom: f64,
    /// Automatic integer magnification so small buffers fill the viewport.
    pub display_scale: u32,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            zoom: 1.0,
            display_scale: 1,
        }
    }
}

impl ViewState {
    /// Composite scale used for rendering.
    pub fn composite_scale(&self) -> f64 {
        self.zoom * self.display_scale as f64
    }
}

/// What the renderer needs: translate by the offset, then scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

impl Transform {
    /// Map a buffer-space point to screen space.
    pub fn to_screen(&self, x: f64, y: f64) -> (f64, f64) {
        ((x + self.offset_x) * self.scale, (y + self.offset_y) * self.scale)
    }

    /// Inverse of [`Transform::to_screen`].
    pub fn to_buffer(&self, sx: f64, sy: f64) -> (f64, f64) {
        (sx / self.scale - self.offset_x, sy / self.scale - self.offset_y)
    }
}

#[derive(Clone, Copy, Debug)]
struct DragAnchor {
    pointer: (f64, f64),
    offset: (f64, f64),
}

/// Pan/zoom state machine. `idle` when `drag` is `None`, `dragging` otherwise.
#[derive(Clone, Debug, Default)]
pub struct ViewTransform {
    state: ViewState,
    drag: Option<DragAnchor>,
}

impl ViewTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    /// Replace the whole view state (undo). Any drag in progress is dropped.
    pub fn restore(&mut self, state: ViewState) {
        self.state = state;
        self.drag = None;
    }

    pub fn zoom(&self) -> f64 {
        self.state.zoom
    }

    pub fn display_scale(&self) -> u32 {
        self.state.display_scale
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// `idle -> dragging`.
    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.drag = Some(DragAnchor {
            pointer: (x, y),
            offset: (self.state.offset_x, self.state.offset_y),
        });
    }

    /// Returns `false` (and does nothing) when not dragging.
    pub fn pointer_move(&mut self, x: f64, y: f64) -> bool {
        let Some(anchor) = self.drag else {
            return false;
        };
        // Drag sensitivity follows the user zoom only; display_scale is cosmetic.
        let dx = (x - anchor.pointer.0) / self.state.zoom;
        let dy = (y - anchor.pointer.1) / self.state.zoom;
        self.state.offset_x = anchor.offset.0 + dx;
        self.state.offset_y = anchor.offset.1 + dy;
        true
    }

    /// `dragging -> idle` on pointer up, cancel or leave.
    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    /// Pan by a screen-space delta.
    pub fn pan(&mut self, dx: f64, dy: f64) -> Result<()> {
        if !dx.is_finite() || !dy.is_finite() {
            return Err(PixelError::invalid("pan", "delta must be finite"));
        }
        self.state.offset_x += dx / self.state.zoom;
        self.state.offset_y += dy / self.state.zoom;
        Ok(())
    }

    /// Set the user zoom. Never touches `display_scale`.
    pub fn set_zoom(&mut self, zoom: f64) -> Result<()> {
        if !zoom.is_finite() || zoom <= 0.0 {
            return Err(PixelError::invalid("zoom", format!("must be > 0, got {}", zoom)));
        }
        self.state.zoom = zoom;
        Ok(())
    }

    /// Pick the integer display scale that makes the buffer fill the container.
    ///
    /// Takes the larger of the two per-axis floors (overscale to fill), clamped
    /// to at least 1. Returns the new display scale.
    pub fn auto_fit(
        &mut self,
        container_width: f64,
        container_height: f64,
        buffer_width: u32,
        buffer_height: u32,
    ) -> Result<u32> {
        for (name, v) in [("container_width", container_width), ("container_height", container_height)] {
            if !v.is_finite() || v < 0.0 {
                return Err(PixelError::invalid(name, format!("must be >= 0, got {}", v)));
            }
        }
        let fit_x = axis_fit(container_width, buffer_width);
        let fit_y = axis_fit(container_height, buffer_height);
        let scale = fit_x.max(fit_y).max(1);
        self.state.display_scale = scale;
        Ok(scale)
    }

    pub fn current_transform(&self) -> Transform {
        Transform {
            offset_x: self.state.offset_x,
            offset_y: self.state.offset_y,
            scale: self.state.composite_scale(),
        }
    }
}

fn axis_fit(container: f64, buffer: u32) -> u32 {
    if buffer == 0 {
        return 1;
    }
    let fit = (container / buffer as f64).floor();
    if fit >= u32::MAX as f64 { u32::MAX } else { fit as u32 }
}
