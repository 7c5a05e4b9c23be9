//! Typed detection records and full-page text items

use crate::geometry::BoundingBox;
use crate::orientation::Orientation;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Text read from a crop, before and after format correction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    pub raw: String,
    pub corrected: String,
    pub confidence: f64,
}

impl RecognizedText {
    pub fn new(raw: String, corrected: String, confidence: f64) -> Self {
        Self {
            raw,
            corrected,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Raw text kept as-is, no template applied
    pub fn uncorrected(raw: String, confidence: f64) -> Self {
        let corrected = raw.clone();
        Self::new(raw, corrected, confidence)
    }

    pub fn was_corrected(&self) -> bool {
        self.raw != self.corrected
    }
}

/// One located symbol instance
///
/// Created by the template matcher with geometry, label, confidence and
/// orientation. Text and sub-region values are attached later, at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: f64,
    pub page: usize,
    pub orientation: Orientation,
    pub model_id: String,
    text: Option<RecognizedText>,
    subclass_values: Option<BTreeMap<String, String>>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, label: impl Into<String>, confidence: f64) -> Self {
        Self {
            bbox,
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            page: 0,
            orientation: Orientation::UPRIGHT,
            model_id: String::new(),
            text: None,
            subclass_values: None,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn on_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }

    pub fn from_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    /// Attach recognized text; refused if text was already attached
    pub fn attach_text(&mut self, text: RecognizedText) -> bool {
        if self.text.is_some() {
            warn!("{}: text already attached, ignoring '{}'", self, text.corrected);
            return false;
        }
        self.text = Some(text);
        true
    }

    /// Attach sub-region values; refused if values were already attached
    pub fn attach_subclass_values(&mut self, values: BTreeMap<String, String>) -> bool {
        if self.subclass_values.is_some() {
            warn!("{}: sub-region values already attached", self);
            return false;
        }
        self.subclass_values = Some(values);
        true
    }

    pub fn text(&self) -> Option<&RecognizedText> {
        self.text.as_ref()
    }

    pub fn ocr_raw_text(&self) -> &str {
        self.text.as_ref().map(|t| t.raw.as_str()).unwrap_or("")
    }

    pub fn ocr_corrected_text(&self) -> &str {
        self.text.as_ref().map(|t| t.corrected.as_str()).unwrap_or("")
    }

    /// 0.0 when no text has been attached
    pub fn ocr_confidence(&self) -> f64 {
        self.text.as_ref().map(|t| t.confidence).unwrap_or(0.0)
    }

    pub fn subclass_values(&self) -> Option<&BTreeMap<String, String>> {
        self.subclass_values.as_ref()
    }

    pub fn subclass_value(&self, name: &str) -> Option<&str> {
        self.subclass_values
            .as_ref()
            .and_then(|values| values.get(name))
            .map(String::as_str)
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} p{} ({:.3},{:.3}) {} conf={:.2}",
            self.label,
            self.page,
            self.bbox.x(),
            self.bbox.y(),
            self.orientation,
            self.confidence
        )
    }
}

/// Reading direction of a full-page OCR pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextOrientation {
    Horizontal,
    Vertical,
}

/// Text span found by full-page OCR, in page-fraction coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
    pub orientation: TextOrientation,
    pub page: usize,
}

impl TextItem {
    pub fn new(
        text: impl Into<String>,
        confidence: f64,
        bbox: BoundingBox,
        orientation: TextOrientation,
    ) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
            orientation,
            page: 0,
        }
    }

    pub fn on_page(mut self, page: usize) -> Self {
        self.page = page;
        self
    }
}
