// ============================================================================
// OPERATIONS — validated, pure transformations over a pixel buffer
// ============================================================================
//
// Every operation reads an immutable input and returns a fresh buffer, so a
// `Job` can run on any thread. Committing the result is the session's job.

pub mod denoise;
pub mod filters;
pub mod grid;
pub mod stats;
pub mod transform;

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::canvas::PixelBuffer;
use crate::error::{PixelError, Result};

pub use denoise::DenoiseParams;

/// Upper bound for percentage parameters.
pub const MAX_PERCENT: u32 = 100;

/// A pixel operation with its parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    /// Block-average on a fixed grid, keeping the canvas size.
    Align { block_size: u32 },
    /// Palette quantization plus optional blur.
    Denoise(DenoiseParams),
    /// Block-average down to an explicit `cols x rows` canvas.
    Downsample { cols: u32, rows: u32 },
    /// One pixel per `block_size` block, on the same grid `Align` uses.
    Shrink { block_size: u32 },
}

impl Operation {
    pub fn validate(&self) -> Result<()> {
        match *self {
            Operation::Align { block_size } | Operation::Shrink { block_size } => {
                if block_size == 0 {
                    return Err(PixelError::invalid("block_size", "must be at least 1"));
                }
            }
            Operation::Denoise(p) => {
                if p.strength > MAX_PERCENT {
                    return Err(PixelError::invalid("strength", format!("must be 0-100, got {}", p.strength)));
                }
                if p.tolerance > MAX_PERCENT {
                    return Err(PixelError::invalid("tolerance", format!("must be 0-100, got {}", p.tolerance)));
                }
                if p.max_colors == 0 {
                    return Err(PixelError::invalid("max_colors", "must be at least 1"));
                }
            }
            Operation::Downsample { cols, rows } => {
                if cols == 0 {
                    return Err(PixelError::invalid("cols", "must be at least 1"));
                }
                if rows == 0 {
                    return Err(PixelError::invalid("rows", "must be at least 1"));
                }
            }
        }
        Ok(())
    }

    /// Validate, then run.
    pub fn apply(&self, src: &PixelBuffer) -> Result<PixelBuffer> {
        self.validate()?;
        Ok(self.run(src))
    }

    fn run(&self, src: &PixelBuffer) -> PixelBuffer {
        match *self {
            Operation::Align { block_size } => grid::align(src, block_size),
            Operation::Denoise(p) => denoise::denoise(src, p),
            Operation::Downsample { cols, rows } => grid::downsample(src, cols, rows),
            Operation::Shrink { block_size } => grid::downsample_by_block(src, block_size),
        }
    }

    /// Only downsampling changes the canvas size (and so forces an auto-fit).
    pub fn changes_dimensions(&self) -> bool {
        matches!(self, Operation::Downsample { .. } | Operation::Shrink { .. })
    }

    /// History label.
    pub fn label(&self) -> String {
        match self {
            Operation::Align { block_size } => format!("Align to {}px grid", block_size),
            Operation::Denoise(p) => format!(
                "Denoise: strength {}%, tolerance {}%, {} colors",
                p.strength, p.tolerance, p.max_colors
            ),
            Operation::Downsample { cols, rows } => format!("Downsample to {}×{}", cols, rows),
            Operation::Shrink { block_size } => format!("Shrink by {}px blocks", block_size),
        }
    }
}

// ============================================================================
// STEPS — textual operation syntax used by the CLI
// ============================================================================

/// An operation as written on the command line.
///
/// Syntax: `align:8`, `denoise:30,20,16`, `shrink:8`, `downsample:40x30`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Align(u32),
    Denoise(DenoiseParams),
    /// Downsample by block size.
    Shrink(u32),
    Downsample(u32, u32),
}

impl Step {
    /// Turn the step into a validated operation.
    pub fn resolve(&self) -> Result<Operation> {
        let op = match *self {
            Step::Align(block_size) => Operation::Align { block_size },
            Step::Denoise(p) => Operation::Denoise(p),
            Step::Shrink(block_size) => Operation::Shrink { block_size },
            Step::Downsample(cols, rows) => Operation::Downsample { cols, rows },
        };
        op.validate()?;
        Ok(op)
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (name, args) = s.split_once(':').unwrap_or((s, ""));
        let num = |v: &str| -> std::result::Result<u32, String> {
            v.trim()
                .parse::<u32>()
                .map_err(|_| format!("'{}' is not a whole number in step '{}'", v.trim(), s))
        };
        match name.trim().to_lowercase().as_str() {
            "align" => Ok(Step::Align(num(args)?)),
            "shrink" => Ok(Step::Shrink(num(args)?)),
            "denoise" => {
                let parts: Vec<&str> = args.split(',').collect();
                if parts.len() != 3 {
                    return Err(format!(
                        "denoise expects strength,tolerance,colors (e.g. denoise:30,20,16), got '{}'",
                        args
                    ));
                }
                Ok(Step::Denoise(DenoiseParams {
                    strength: num(parts[0])?,
                    tolerance: num(parts[1])?,
                    max_colors: num(parts[2])?,
                }))
            }
            "downsample" => {
                let (c, r) = args
                    .split_once(['x', 'X'])
                    .ok_or_else(|| format!("downsample expects COLSxROWS, got '{}'", args))?;
                Ok(Step::Downsample(num(c)?, num(r)?))
            }
            other => Err(format!(
                "unknown step '{}' (expected align, denoise, shrink or downsample)",
                other
            )),
        }
    }
}

// ============================================================================
// JOBS — one outstanding operation, runnable off the coordinating thread
// ============================================================================

/// A validated operation bound to a snapshot of the input buffer.
#[derive(Debug)]
pub struct Job {
    ticket: u64,
    operation: Operation,
    input: Arc<PixelBuffer>,
}

impl Job {
    pub(crate) fn new(ticket: u64, operation: Operation, input: Arc<PixelBuffer>) -> Self {
        Self { ticket, operation, input }
    }

    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Pure computation; touches no session state.
    pub fn run(self) -> OperationResult {
        let started = Instant::now();
        let output = self.operation.run(&self.input);
        OperationResult {
            ticket: self.ticket,
            operation: self.operation,
            output,
            elapsed: started.elapsed(),
        }
    }
}

/// Output of [`Job::run`], handed back to the session for commit.
#[derive(Debug)]
pub struct OperationResult {
    pub ticket: u64,
    pub operation: Operation,
    pub output: PixelBuffer,
    pub elapsed: Duration,
}
