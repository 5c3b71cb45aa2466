use std::collections::VecDeque;
use std::io::Cursor;

use crate::canvas::{PixelBuffer, ViewState};
use crate::error::{PixelError, Result};

/// Default number of undo steps kept.
pub const DEFAULT_HISTORY_DEPTH: usize = 50;

// ============================================================================
// SNAPSHOT — full-canvas state to return to on undo
// ============================================================================

/// Immutable capture of the buffer and view taken before an operation commits.
///
/// Pixels are stored PNG-encoded: lossless and usually far smaller than the
/// raw RGBA, which matters with fifty full-canvas entries.
#[derive(Clone, Debug)]
pub struct Snapshot {
    encoded: Vec<u8>,
    width: u32,
    height: u32,
    view: ViewState,
    label: String,
}

impl Snapshot {
    /// Capture `buffer` and `view`. `label` names the operation about to run.
    pub fn capture(buffer: &PixelBuffer, view: ViewState, label: impl Into<String>) -> Result<Self> {
        buffer.assert_consistent();
        Ok(Self {
            encoded: encode_png(buffer)?,
            width: buffer.width(),
            height: buffer.height(),
            view,
            label: label.into(),
        })
    }

    /// Decode the stored pixels back into a buffer.
    pub fn decode(&self) -> Result<PixelBuffer> {
        if self.width == 0 || self.height == 0 {
            return Ok(PixelBuffer::new(self.width, self.height));
        }
        let decoder = png::Decoder::new(Cursor::new(&self.encoded));
        let mut reader = decoder.read_info()?;
        let mut buf = vec![0u8; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buf)?;
        if info.color_type != png::ColorType::Rgba || info.bit_depth != png::BitDepth::Eight {
            return Err(PixelError::Snapshot(format!(
                "unexpected snapshot pixel format {:?}/{:?}",
                info.color_type, info.bit_depth
            )));
        }
        if (info.width, info.height) != (self.width, self.height) {
            return Err(PixelError::Snapshot(format!(
                "snapshot is {}x{} but was captured at {}x{}",
                info.width, info.height, self.width, self.height
            )));
        }
        buf.truncate(info.buffer_size());
        PixelBuffer::from_raw(self.width, self.height, buf)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn memory_size(&self) -> usize {
        self.encoded.len() + self.label.len()
    }
}

fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>> {
    if buffer.is_empty() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, buffer.width(), buffer.height());
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Fast);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(buffer.as_raw())?;
        writer.finish()?;
    }
    Ok(out)
}

// ============================================================================
// HISTORY STACK — bounded LIFO of snapshots
// ============================================================================

/// Undo stack. Pushing past capacity evicts the oldest entry.
#[derive(Debug)]
pub struct HistoryStack {
    entries: VecDeque<Snapshot>,
    capacity: usize,
    /// Running memory total across all entries.
    total_memory: usize,
}

impl Default for HistoryStack {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl HistoryStack {
    /// `capacity` 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            total_memory: 0,
        }
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.total_memory += snapshot.memory_size();
        self.entries.push_back(snapshot);
        self.prune();
    }

    /// Remove and return the most recent snapshot, `None` when empty.
    pub fn pop(&mut self) -> Option<Snapshot> {
        let snapshot = self.entries.pop_back()?;
        self.total_memory = self.total_memory.saturating_sub(snapshot.memory_size());
        Some(snapshot)
    }

    pub fn peek(&self) -> Option<&Snapshot> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Labels, most recent first.
    pub fn labels(&self) -> Vec<String> {
        self.entries.iter().rev().map(|s| s.label.clone()).collect()
    }

    /// Encoded bytes held by all entries (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.total_memory = 0;
    }

    fn prune(&mut self) {
        while self.entries.len() > self.capacity {
            if let Some(removed) = self.entries.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_size());
            }
        }
    }
}
