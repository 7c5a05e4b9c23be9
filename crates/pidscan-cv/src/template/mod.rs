//! Template matching module

pub mod expander;
pub mod matcher;

pub use expander::{TemplateExpander, extract_training_crop};
pub use matcher::{ModelMatches, TemplateMatcher, preprocess};

use crate::Result;
use anyhow::Context;
use opencv::core::Mat;
use opencv::prelude::*;
use pidscan_core::{BoxSize, Orientation, RegionSpec, ResolvedRegion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One stored variant of a class
///
/// The image is already grayscale and preprocessed.
#[derive(Debug, Clone)]
pub struct Template {
    pub label: String,
    pub image: Mat,
    pub orientation: Orientation,
}

impl Template {
    pub fn new(label: impl Into<String>, image: Mat, orientation: Orientation) -> Self {
        Self {
            label: label.into(),
            image,
            orientation,
        }
    }

    /// `(width, height)` in pixels
    pub fn size(&self) -> (i32, i32) {
        (self.image.cols(), self.image.rows())
    }
}

/// Template matching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Minimum correlation score, `[0,1]`
    pub threshold: f64,
    /// Raw matches above which a template is discarded as degenerate
    pub max_raw_matches: usize,
    /// Gaussian kernel edge, odd
    pub blur_kernel: i32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            max_raw_matches: 1000,
            blur_kernel: 3,
        }
    }
}

impl MatcherConfig {
    /// Configuration for clean vector-rendered drawings
    pub fn strict() -> Self {
        Self {
            threshold: 0.85,
            ..Default::default()
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// Per-class metadata saved next to a model's templates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelMetadata {
    #[serde(default)]
    pub subclass_regions: BTreeMap<String, BTreeMap<String, RegionSpec>>,
    #[serde(default)]
    pub training_box_sizes: BTreeMap<String, BoxSize>,
    #[serde(default)]
    pub multi_orientation: bool,
    #[serde(default)]
    pub include_inverted: bool,
}

impl ModelMetadata {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse model metadata")
    }
}

/// Templates and sub-regions of one trained model
///
/// Read-only after loading; shared across requests behind an `Arc`.
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model_id: String,
    templates: BTreeMap<String, Vec<Template>>,
    regions: BTreeMap<String, Vec<ResolvedRegion>>,
}

impl TrainedModel {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            templates: BTreeMap::new(),
            regions: BTreeMap::new(),
        }
    }

    /// Resolve stored sub-regions into the canonical form
    pub fn with_metadata(mut self, metadata: &ModelMetadata) -> Self {
        for (label, specs) in &metadata.subclass_regions {
            let class_box = metadata.training_box_sizes.get(label).copied();
            let resolved = specs
                .iter()
                .map(|(name, spec)| spec.resolve(name.clone(), class_box))
                .collect();
            self.regions.insert(label.clone(), resolved);
        }
        self
    }

    pub fn with_regions(mut self, label: impl Into<String>, regions: Vec<ResolvedRegion>) -> Self {
        self.regions.insert(label.into(), regions);
        self
    }

    /// Merge newly trained variants into the model
    pub fn add_templates(&mut self, templates: impl IntoIterator<Item = Template>) {
        let mut added = 0;
        for template in templates {
            self.templates
                .entry(template.label.clone())
                .or_default()
                .push(template);
            added += 1;
        }
        debug!("{}: added {} template variants", self.model_id, added);
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn templates(&self, label: &str) -> &[Template] {
        self.templates.get(label).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every variant of every label, in label order
    pub fn all_templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values().flatten()
    }

    pub fn template_count(&self) -> usize {
        self.templates.values().map(Vec::len).sum()
    }

    /// Sub-regions configured for a label; empty when none
    pub fn regions(&self, label: &str) -> &[ResolvedRegion] {
        self.regions.get(label).map(Vec::as_slice).unwrap_or(&[])
    }
}
