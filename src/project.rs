use std::sync::{Arc, mpsc};

use image::Rgba;
use uuid::Uuid;

use crate::canvas::{PixelBuffer, Transform, ViewState, ViewTransform};
use crate::components::history::{DEFAULT_HISTORY_DEPTH, HistoryStack, Snapshot};
use crate::error::{PixelError, Result};
use crate::io::format_file_size;
use crate::ops::transform::export_buffer;
use crate::ops::{DenoiseParams, Job, Operation, OperationResult};
use crate::{log_err, log_info, log_warn};

/// A job handed to a rayon worker. Receive on `receiver`, then pass the
/// result to [`Session::commit`] (or call [`Session::finish`]).
#[derive(Debug)]
pub struct JobHandle {
    pub ticket: u64,
    pub receiver: mpsc::Receiver<OperationResult>,
}

impl JobHandle {
    /// Block until the worker reports. `None` means the worker died.
    pub fn wait(&self) -> Option<OperationResult> {
        self.receiver.recv().ok()
    }
}

/// Single open image: buffer, undo history and view, plus the one-job-at-a-time gate.
///
/// Every mutation of the buffer goes through [`Session::commit`].
#[derive(Debug)]
pub struct Session {
    pub id: Uuid,
    /// Display name (file name of the source image).
    pub name: String,
    /// Size of the source file, when loaded from disk.
    pub source_size_bytes: Option<u64>,

    buffer: PixelBuffer,
    /// The buffer as first loaded, for `reset`.
    original: PixelBuffer,
    history: HistoryStack,
    view: ViewTransform,
    /// Last known viewport size, used for auto-fit.
    container: Option<(f64, f64)>,
    /// Ticket of the outstanding job, if any.
    pending: Option<u64>,
    next_ticket: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl Session {
    /// Empty (0x0) session with room for `max_undo_steps` snapshots.
    pub fn new(max_undo_steps: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: "Untitled".to_string(),
            source_size_bytes: None,
            buffer: PixelBuffer::new(0, 0),
            original: PixelBuffer::new(0, 0),
            history: HistoryStack::new(max_undo_steps),
            view: ViewTransform::new(),
            container: None,
            pending: None,
            next_ticket: 1,
        }
    }

    /// Session wrapping an already decoded buffer.
    pub fn from_buffer(name: impl Into<String>, buffer: PixelBuffer, max_undo_steps: usize) -> Self {
        let mut session = Self::new(max_undo_steps);
        session.install(name.into(), buffer);
        session
    }

    /// Replace the image with raw RGBA data. Clears history and resets the view.
    pub fn load_buffer(&mut self, name: impl Into<String>, width: u32, height: u32, rgba: Vec<u8>) -> Result<()> {
        if let Some(ticket) = self.pending {
            log_warn!("Load rejected: job #{} still running", ticket);
            return Err(PixelError::OperationInProgress);
        }
        let buffer = PixelBuffer::from_raw(width, height, rgba)?;
        self.install(name.into(), buffer);
        Ok(())
    }

    fn install(&mut self, name: String, buffer: PixelBuffer) {
        log_info!(
            "Loaded '{}' ({}x{}, up to {} undo steps)",
            name,
            buffer.width(),
            buffer.height(),
            self.history.capacity()
        );
        self.name = name;
        self.original = buffer.clone();
        self.buffer = buffer;
        self.history.clear();
        self.view = ViewTransform::new();
        self.refit();
    }

    // ========================================================================
    // JOBS
    // ========================================================================

    /// Validate `op` and reserve the session for it.
    ///
    /// The returned job holds a shared copy of the current buffer, so it can
    /// run anywhere. Nothing changes until the result is committed.
    pub fn begin(&mut self, op: Operation) -> Result<Job> {
        if let Some(ticket) = self.pending {
            log_warn!("'{}' rejected: job #{} still running", op.label(), ticket);
            return Err(PixelError::OperationInProgress);
        }
        op.validate()?;
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1);
        self.pending = Some(ticket);
        Ok(Job::new(ticket, op, Arc::new(self.buffer.clone())))
    }

    /// Commit a finished job: snapshot the current state, swap in the output,
    /// then re-fit the view if the canvas size changed.
    ///
    /// A result whose ticket is not the outstanding one is rejected with
    /// `StaleResult` and leaves the session untouched.
    pub fn commit(&mut self, result: OperationResult) -> Result<()> {
        if self.pending != Some(result.ticket) {
            log_warn!("Dropped stale result for job #{}", result.ticket);
            return Err(PixelError::StaleResult { ticket: result.ticket });
        }
        result.output.assert_consistent();
        let label = result.operation.label();
        let snapshot = match Snapshot::capture(&self.buffer, self.view.state(), label.clone()) {
            Ok(s) => s,
            Err(e) => {
                // No undo entry, no commit.
                self.pending = None;
                log_err!("'{}' not applied: {}", label, e);
                return Err(e);
            }
        };
        self.history.push(snapshot);
        self.buffer = result.output;
        self.pending = None;
        if result.operation.changes_dimensions() {
            self.refit();
        }
        log_info!(
            "{} -> {}x{} in {:.0}ms ({} undo steps, {})",
            label,
            self.buffer.width(),
            self.buffer.height(),
            result.elapsed.as_secs_f64() * 1000.0,
            self.history.len(),
            format_file_size(self.history.memory_usage() as u64)
        );
        Ok(())
    }

    /// Give up on an outstanding job without touching the buffer.
    pub fn abandon(&mut self, ticket: u64) -> bool {
        if self.pending == Some(ticket) {
            self.pending = None;
            log_warn!("Job #{} abandoned", ticket);
            true
        } else {
            false
        }
    }

    /// Run `op` on the rayon pool. The session stays busy until the result
    /// is committed or the job abandoned.
    pub fn spawn(&mut self, op: Operation) -> Result<JobHandle> {
        let job = self.begin(op)?;
        let ticket = job.ticket();
        let (sender, receiver) = mpsc::channel();
        rayon::spawn(move || {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| job.run()));
            match result {
                Ok(r) => {
                    let _ = sender.send(r);
                }
                Err(_) => {
                    log_err!("Job #{} panicked", ticket);
                }
            }
        });
        Ok(JobHandle { ticket, receiver })
    }

    /// Wait for a spawned job and commit it. A dead worker releases the session.
    pub fn finish(&mut self, handle: JobHandle) -> Result<()> {
        match handle.wait() {
            Some(result) => self.commit(result),
            None => {
                self.abandon(handle.ticket);
                Err(PixelError::JobFailed { ticket: handle.ticket })
            }
        }
    }

    /// Begin, run and commit on the calling thread.
    pub fn apply(&mut self, op: Operation) -> Result<()> {
        let job = self.begin(op)?;
        let result = job.run();
        self.commit(result)
    }

    pub fn align(&mut self, block_size: u32) -> Result<()> {
        self.apply(Operation::Align { block_size })
    }

    pub fn denoise(&mut self, strength: u32, tolerance: u32, max_colors: u32) -> Result<()> {
        self.apply(Operation::Denoise(DenoiseParams { strength, tolerance, max_colors }))
    }

    pub fn downsample(&mut self, cols: u32, rows: u32) -> Result<()> {
        self.apply(Operation::Downsample { cols, rows })
    }

    // ========================================================================
    // HISTORY
    // ========================================================================

    /// Restore the most recent snapshot (buffer and view) and return the view.
    pub fn undo(&mut self) -> Result<ViewState> {
        if let Some(ticket) = self.pending {
            log_warn!("Undo rejected: job #{} still running", ticket);
            return Err(PixelError::OperationInProgress);
        }
        let Some(top) = self.history.peek() else {
            return Err(PixelError::EmptyHistory);
        };
        let restored = top.decode()?;
        let view = top.view();
        let label = top.label().to_string();
        self.history.pop();
        self.buffer = restored;
        self.view.restore(view);
        log_info!("Undo '{}' ({} steps left)", label, self.history.len());
        Ok(view)
    }

    /// Put the originally loaded image back. The reset itself can be undone.
    pub fn reset(&mut self) -> Result<()> {
        if let Some(ticket) = self.pending {
            log_warn!("Reset rejected: job #{} still running", ticket);
            return Err(PixelError::OperationInProgress);
        }
        let snapshot = Snapshot::capture(&self.buffer, self.view.state(), "Reset image")?;
        let resized = (self.buffer.width(), self.buffer.height())
            != (self.original.width(), self.original.height());
        self.history.push(snapshot);
        self.buffer = self.original.clone();
        if resized {
            self.refit();
        }
        log_info!("Reset to original {}x{}", self.buffer.width(), self.buffer.height());
        Ok(())
    }

    /// Labels of undoable steps, most recent first.
    pub fn history_labels(&self) -> Vec<String> {
        self.history.labels()
    }

    pub fn undo_count(&self) -> usize {
        self.history.len()
    }

    // ========================================================================
    // VIEW
    // ========================================================================

    pub fn pan(&mut self, dx: f64, dy: f64) -> Result<()> {
        self.view.pan(dx, dy)
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        self.view.pointer_down(x, y);
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) -> bool {
        self.view.pointer_move(x, y)
    }

    pub fn pointer_up(&mut self) {
        self.view.pointer_up();
    }

    pub fn set_zoom(&mut self, zoom: f64) -> Result<()> {
        self.view.set_zoom(zoom)
    }

    /// Record the viewport size and re-fit the display scale to it.
    pub fn set_container(&mut self, width: f64, height: f64) -> Result<u32> {
        let scale = self.view.auto_fit(width, height, self.buffer.width(), self.buffer.height())?;
        self.container = Some((width, height));
        Ok(scale)
    }

    fn refit(&mut self) {
        if let Some((w, h)) = self.container
            && let Err(e) = self.view.auto_fit(w, h, self.buffer.width(), self.buffer.height())
        {
            log_warn!("Auto-fit skipped: {}", e);
        }
    }

    pub fn current_transform(&self) -> Transform {
        self.view.current_transform()
    }

    pub fn view_state(&self) -> ViewState {
        self.view.state()
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        self.buffer.get_pixel(x, y)
    }

    pub fn is_processing(&self) -> bool {
        self.pending.is_some()
    }

    /// Resampled copy of the current buffer for saving.
    pub fn export(&self, scale: f64) -> Result<PixelBuffer> {
        export_buffer(&self.buffer, scale)
    }
}
