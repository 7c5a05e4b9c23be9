//! pidscan core
//!
//! Detection and normalization engine for symbols on engineering drawings:
//! box geometry, variant orientation, typed detection records, the three
//! deduplication passes, sub-region mapping and format-template correction.
//! Nothing here touches pixels; raster work lives in `pidscan-cv`.

pub mod dedup;
pub mod detection;
pub mod error;
pub mod format;
pub mod geometry;
pub mod orientation;
pub mod region;

// Re-export commonly used types
pub use dedup::{
    CenterRule, NmsConfig, TextDedupConfig, dedup_text_items, suppress_cross_model,
    suppress_single_model,
};
pub use detection::{Detection, RecognizedText, TextItem, TextOrientation};
pub use error::{Error, Result};
pub use format::{CorrectionAllowance, FormatRegistry, Section, TagNormalizer, correct};
pub use geometry::{BoundingBox, PixelRect};
pub use orientation::{Orientation, Rotation};
pub use region::{BoxSize, RegionSpec, RelativeRect, ResolvedRegion};
