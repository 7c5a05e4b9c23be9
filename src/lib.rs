//! pidscan
//!
//! Finds recurring symbols on scanned engineering drawings and reads their
//! text. The pipeline renders each page, matches every model's template
//! variants, suppresses duplicates within and across models, then reads
//! each instance through the configured OCR engine and corrects the result
//! against the class format.

pub mod config;
pub mod fullpage;
pub mod ocr;
pub mod pipeline;
pub mod report;

pub use config::{ModelSettings, OcrCropConfig, PipelineConfig, DETECTION_DPI, OCR_DPI};
pub use ocr::InstanceReader;
pub use pipeline::Pipeline;
pub use report::{DetectionReport, FailureScope, UnitFailure};

pub type Result<T> = anyhow::Result<T>;
