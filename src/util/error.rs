//! Error types for detgeom.

use thiserror::Error;

/// Result alias for detgeom operations.
pub type DetGeomResult<T> = std::result::Result<T, DetGeomError>;

/// Errors that can occur when running detgeom stages.
///
/// Configuration errors are raised eagerly by the `validate` methods on the
/// stage configs; shape errors are raised per call. Degenerate geometry
/// (zero-area boxes) is never an error: such entries are filtered or ignored.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetGeomError {
    /// A stage configuration failed eager validation.
    #[error("invalid {context} config: {reason}")]
    InvalidConfig {
        context: &'static str,
        reason: &'static str,
    },
    /// A per-call tensor dimension disagrees with the documented contract.
    #[error("shape mismatch for {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        expected: usize,
        got: usize,
        context: &'static str,
    },
    /// Width, height or channel count is zero or otherwise unusable.
    #[error("invalid dimensions: {height}x{width}x{channels}")]
    InvalidDimensions {
        height: usize,
        width: usize,
        channels: usize,
    },
    /// A backing buffer is smaller than its declared dimensions require.
    #[error("buffer too small: needed {needed}, got {got}")]
    BufferTooSmall { needed: usize, got: usize },
    /// An index is out of bounds for the named collection.
    #[error("index {index} out of bounds for {context} of length {len}")]
    IndexOutOfBounds {
        index: usize,
        len: usize,
        context: &'static str,
    },
}
