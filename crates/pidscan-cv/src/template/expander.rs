//! Training-time template extraction and variant expansion

use super::{ModelMetadata, Template};
use super::matcher::preprocess;
use crate::Result;
use crate::utils::ImageUtils;
use crate::utils::crop::{crop, flip_horizontal, rotate};
use anyhow::{Context, bail};
use opencv::core::Mat;
use pidscan_core::{BoundingBox, Orientation, Rotation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Cut an annotated box out of a detection-DPI page and preprocess it
pub fn extract_training_crop(page: &Mat, bbox: &BoundingBox, blur_kernel: i32) -> Result<Mat> {
    let (width, height) = ImageUtils::dimensions(page);
    let rect = bbox.to_pixels(width, height).clamp_to(width, height);
    if rect.is_empty() {
        bail!("Annotation {:?} lies outside the {}x{} page", bbox, width, height);
    }

    let region = crop(page, rect).context("Failed to crop training annotation")?;
    preprocess(&region, blur_kernel)
}

/// Which variants to store for each annotated crop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateExpander {
    pub multi_orientation: bool,
    pub mirroring: bool,
}

impl TemplateExpander {
    pub fn new(multi_orientation: bool, mirroring: bool) -> Self {
        Self {
            multi_orientation,
            mirroring,
        }
    }

    /// Expansion settings recorded with a model
    pub fn for_model(metadata: &ModelMetadata) -> Self {
        Self::new(metadata.multi_orientation, metadata.include_inverted)
    }

    /// Rotations stored for every crop
    pub fn rotations(&self) -> &'static [Rotation] {
        if self.multi_orientation {
            &Rotation::ALL
        } else {
            &[Rotation::Deg0]
        }
    }

    /// Number of variants produced per crop
    pub fn variant_count(&self) -> usize {
        self.rotations().len() * if self.mirroring { 2 } else { 1 }
    }

    /// Expand one preprocessed crop into its stored variants
    ///
    /// The upright unmirrored variant always comes first.
    pub fn expand(&self, label: &str, crop: &Mat) -> Result<Vec<Template>> {
        let mut variants = Vec::with_capacity(self.variant_count());

        for &rotation in self.rotations() {
            let rotated = rotate(crop, rotation)?;
            if self.mirroring {
                let flipped = flip_horizontal(&rotated)?;
                variants.push(Template::new(label, rotated, Orientation::new(rotation, false)));
                variants.push(Template::new(label, flipped, Orientation::new(rotation, true)));
            } else {
                variants.push(Template::new(label, rotated, Orientation::new(rotation, false)));
            }
        }

        debug!("{}: {} variants", label, variants.len());
        if self.mirroring {
            info!("Created mirrored templates for '{}'", label);
        }
        Ok(variants)
    }
}
