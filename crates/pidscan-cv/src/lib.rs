//! pidscan Computer Vision Library
//!
//! Raster-side half of the symbol detector: preprocessing and template
//! matching on OpenCV mats, training-time variant expansion, OCR crop
//! extraction, and the collaborator boundary (rasterizer, OCR engine,
//! model store) with its caches.

pub mod cache;
pub mod raster;
pub mod template;
pub mod utils;

// Re-export commonly used types
pub use cache::{ModelCache, PageCache};
pub use raster::ImageDirRasterizer;
pub use template::{
    MatcherConfig, ModelMatches, ModelMetadata, Template, TemplateExpander, TemplateMatcher,
    TrainedModel,
};

// Error handling
pub type Result<T> = anyhow::Result<T>;

/// Collaborator boundary
///
/// Implementations are shared across worker threads and must not rely on
/// per-call mutable state.
pub mod traits {
    use super::*;
    use opencv::core::Mat;
    use pidscan_core::PixelRect;
    use std::path::Path;

    /// Renders one page of a drawing to a raster
    pub trait Rasterizer: Send + Sync {
        /// Render `page_index` (0-based) at `dpi`; the raster may be color or grayscale
        fn render_page(&self, path: &Path, page_index: usize, dpi: u32) -> Result<Mat>;
    }

    /// Text read from one crop
    #[derive(Debug, Clone, PartialEq)]
    pub struct OcrReading {
        pub text: String,
        /// In `[0,1]`; engines without a score report 0.0
        pub confidence: f64,
    }

    impl OcrReading {
        pub fn new(text: impl Into<String>, confidence: f64) -> Self {
            Self {
                text: text.into(),
                confidence: confidence.clamp(0.0, 1.0),
            }
        }
    }

    /// Text span found on a whole page, in pixels of the raster it was read from
    #[derive(Debug, Clone, PartialEq)]
    pub struct PageTextSpan {
        pub rect: PixelRect,
        pub text: String,
        pub confidence: f64,
    }

    /// Optical character recognition engine
    pub trait OcrEngine: Send + Sync {
        fn recognize(&self, crop: &Mat) -> Result<OcrReading>;

        /// Detect and read every text span on a page raster
        fn read_page(&self, page: &Mat) -> Result<Vec<PageTextSpan>>;
    }

    /// Supplies trained models by id
    pub trait ModelStore: Send + Sync {
        /// `Ok(None)` when no model with this id exists
        fn load(&self, model_id: &str) -> Result<Option<TrainedModel>>;
    }
}
