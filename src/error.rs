// ============================================================================
// ERRORS — typed failures surfaced to the caller
// ============================================================================

/// Error type for pixel operations, history and view state.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelError {
    /// A parameter was rejected before any computation ran.
    InvalidParameter { name: &'static str, reason: String },
    /// A processing job is already outstanding on this session.
    OperationInProgress,
    /// Undo was requested with no snapshots on the stack.
    EmptyHistory,
    /// Raw RGBA data does not match `width * height * 4`.
    DimensionMismatch { expected: usize, actual: usize },
    /// A worker result arrived for a job that is no longer outstanding.
    StaleResult { ticket: u64 },
    /// A background worker died without reporting a result.
    JobFailed { ticket: u64 },
    /// A history snapshot could not be encoded or decoded.
    Snapshot(String),
}

impl PixelError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        PixelError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for PixelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PixelError::InvalidParameter { name, reason } => {
                write!(f, "invalid parameter '{}': {}", name, reason)
            }
            PixelError::OperationInProgress => write!(f, "an operation is already in progress"),
            PixelError::EmptyHistory => write!(f, "nothing to undo"),
            PixelError::DimensionMismatch { expected, actual } => write!(
                f,
                "pixel data length {} does not match dimensions (expected {})",
                actual, expected
            ),
            PixelError::StaleResult { ticket } => {
                write!(f, "result for job #{} is no longer expected", ticket)
            }
            PixelError::JobFailed { ticket } => write!(f, "job #{} failed without a result", ticket),
            PixelError::Snapshot(e) => write!(f, "snapshot error: {}", e),
        }
    }
}

impl std::error::Error for PixelError {}

impl From<png::EncodingError> for PixelError {
    fn from(e: png::EncodingError) -> Self {
        PixelError::Snapshot(e.to_string())
    }
}

impl From<png::DecodingError> for PixelError {
    fn from(e: png::DecodingError) -> Self {
        PixelError::Snapshot(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PixelError>;
