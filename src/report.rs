//! Batch results with per-unit failures

use pidscan_core::{Detection, Error};
use std::fmt;

/// Smallest unit of work a failure was confined to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureScope {
    /// The OCR engine as a whole
    Engine,
    Model { model_id: String },
    Page { page: usize },
    Template { model_id: String, page: usize, label: String },
    /// One detection, by index into the report's detections
    Instance { index: usize },
    SubRegion { index: usize, name: String },
}

impl fmt::Display for FailureScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureScope::Engine => write!(f, "ocr engine"),
            FailureScope::Model { model_id } => write!(f, "model {}", model_id),
            FailureScope::Page { page } => write!(f, "page {}", page),
            FailureScope::Template {
                model_id,
                page,
                label,
            } => write!(f, "template {}/{} on page {}", model_id, label, page),
            FailureScope::Instance { index } => write!(f, "instance {}", index),
            FailureScope::SubRegion { index, name } => {
                write!(f, "sub-region {} of instance {}", name, index)
            }
        }
    }
}

/// A failure that degraded one unit and let the batch continue
#[derive(Debug, Clone, PartialEq)]
pub struct UnitFailure {
    pub scope: FailureScope,
    pub error: Error,
}

impl UnitFailure {
    pub fn new(scope: FailureScope, error: Error) -> Self {
        Self { scope, error }
    }
}

impl fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.scope, self.error)
    }
}

/// Output of one detection request
#[derive(Debug, Clone, Default)]
pub struct DetectionReport {
    pub detections: Vec<Detection>,
    pub failures: Vec<UnitFailure>,
}

impl DetectionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
