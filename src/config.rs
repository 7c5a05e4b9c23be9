//! Pipeline configuration

use anyhow::Context;
use pidscan_core::{FormatRegistry, NmsConfig, TextDedupConfig};
use pidscan_cv::MatcherConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Detection rasters must use the DPI the templates were trained at
pub const DETECTION_DPI: u32 = 150;
/// Crops for OCR come from a finer raster
pub const OCR_DPI: u32 = 300;

/// Settings one model overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModelSettings {
    /// Match threshold for this model instead of the global one
    pub confidence: Option<f64>,
    /// Overrides the global OCR switch for this model
    #[serde(rename = "enableOCR")]
    pub enable_ocr: Option<bool>,
    /// Format template per sub-region name
    pub subclass_formats: BTreeMap<String, String>,
}

/// Crop geometry for instance OCR
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OcrCropConfig {
    /// Whole-box crops are scaled about their center by this factor
    pub padding_factor: f64,
    /// Pixels added around sub-region crops
    pub region_padding: i64,
    /// Whole-box crops shorter than this are upscaled
    pub min_text_height: i32,
    pub max_upscale: f64,
    /// Sub-region crops are always upscaled by this factor
    pub region_upscale: f64,
}

impl Default for OcrCropConfig {
    fn default() -> Self {
        Self {
            padding_factor: 1.0,
            region_padding: pidscan_core::region::DEFAULT_REGION_PADDING,
            min_text_height: 24,
            max_upscale: 3.0,
            region_upscale: 3.0,
        }
    }
}

/// Main pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    pub detection_dpi: u32,
    pub ocr_dpi: u32,
    pub matcher: MatcherConfig,
    pub enable_ocr: bool,
    pub per_model: BTreeMap<String, ModelSettings>,
    pub nms: NmsConfig,
    pub text_dedup: TextDedupConfig,
    pub ocr_crop: OcrCropConfig,
    /// Whole-box format templates
    pub formats: FormatRegistry,
    /// Reshape text with no format template as a `LETTERS-NUMBER` tag
    pub normalize_unformatted: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detection_dpi: DETECTION_DPI,
            ocr_dpi: OCR_DPI,
            matcher: MatcherConfig::default(),
            enable_ocr: true,
            per_model: BTreeMap::new(),
            nms: NmsConfig::default(),
            text_dedup: TextDedupConfig::default(),
            ocr_crop: OcrCropConfig::default(),
            formats: FormatRegistry::default(),
            normalize_unformatted: false,
        }
    }
}

impl PipelineConfig {
    /// Symbol detection without any text reading
    pub fn detection_only() -> Self {
        Self {
            enable_ocr: false,
            ..Default::default()
        }
    }

    /// One format template applied to every class without its own
    pub fn with_global_format(mut self, template: impl Into<String>) -> Self {
        self.formats = FormatRegistry::global(template);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.matcher = self.matcher.with_threshold(threshold);
        self
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {:?}", path.as_ref()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {:?}", path.as_ref()))
    }

    /// Match threshold for a model
    pub fn threshold_for(&self, model_id: &str) -> f64 {
        self.per_model
            .get(model_id)
            .and_then(|s| s.confidence)
            .unwrap_or(self.matcher.threshold)
    }

    /// Whether detections of a model get text
    pub fn ocr_enabled_for(&self, model_id: &str) -> bool {
        self.per_model
            .get(model_id)
            .and_then(|s| s.enable_ocr)
            .unwrap_or(self.enable_ocr)
    }

    /// Format template for one sub-region of a model's detections
    pub fn subclass_format(&self, model_id: &str, region: &str) -> Option<&str> {
        self.per_model
            .get(model_id)
            .and_then(|s| s.subclass_formats.get(region))
            .map(String::as_str)
            .filter(|f| !f.is_empty())
    }
}
