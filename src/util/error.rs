//! Error types for multibox.

use thiserror::Error;

/// Result alias for multibox operations.
pub type MultiboxResult<T> = std::result::Result<T, MultiboxError>;

/// Errors that can occur when decoding and selecting detections.
///
/// Every variant is a contract violation on the caller's side; the detector
/// refuses to produce output rather than emit silently wrong geometry.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum MultiboxError {
    /// The input data or parameters are invalid.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Batch dimensions are zero or overflow `usize` arithmetic.
    #[error(
        "invalid dimensions: batch_size={batch_size}, num_priors={num_priors}, num_classes={num_classes}"
    )]
    InvalidDimensions {
        batch_size: usize,
        num_priors: usize,
        num_classes: usize,
    },
    /// A flat buffer does not match the length implied by the declared shape.
    #[error("shape mismatch for {context}: expected {expected} values, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
    /// An anchor box has a non-positive (or non-finite) width or height.
    #[error("degenerate anchor {index}: width={width}, height={height}")]
    DegenerateAnchor { index: usize, width: f32, height: f32 },
    /// The output buffer width is not the fixed detection row width.
    #[error("invalid output width: expected 6 columns, got {got}")]
    InvalidOutputWidth { got: usize },
}
