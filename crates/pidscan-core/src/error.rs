//! Error taxonomy for the detection engine
//!
//! Every variant except [`Error::InvalidBoundingBox`] is scoped to one unit of
//! work (a template, a page, an instance, a sub-region) and never aborts a batch.

use thiserror::Error;

/// Errors produced by the detection and normalization engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A template produced more raw matches than the cap allows on one page
    #[error("template '{label}' produced {matches} raw matches (cap {cap}); discarded as degenerate")]
    TemplateTooPermissive {
        label: String,
        matches: usize,
        cap: usize,
    },

    /// The rasterizer could not supply a page
    #[error("page {page} unavailable: {reason}")]
    PageUnavailable { page: usize, reason: String },

    /// No OCR engine is configured, or it refused to start
    #[error("OCR engine unavailable: {0}")]
    OcrUnavailable(String),

    /// The OCR engine failed on a single crop
    #[error("OCR failed: {0}")]
    OcrFailed(String),

    /// A sub-region transform produced an empty or degenerate crop
    #[error("sub-region '{name}' is malformed: {reason}")]
    MalformedRegion { name: String, reason: String },

    /// A model id could not be resolved by the model store
    #[error("model '{0}' unavailable")]
    ModelUnavailable(String),

    /// Precondition violation: boxes must have positive, finite extents
    #[error("invalid bounding box (x={x}, y={y}, width={width}, height={height})")]
    InvalidBoundingBox {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl Error {
    /// Whether the error is a caller bug rather than a degraded unit of work
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::InvalidBoundingBox { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
