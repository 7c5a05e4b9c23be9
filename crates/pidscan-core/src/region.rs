//! Sub-region coordinate mapping
//!
//! A sub-region is a named rectangle inside a symbol (a tag number inside an
//! instrument bubble, say) stored in the upright, unmirrored frame of the
//! training box. At inference the detection may have matched a rotated or
//! mirrored template variant, so the rectangle is first re-expressed in the
//! detection's local frame, then projected through the detection box onto
//! the page.
//!
//! Two stored formats exist. Both are resolved once, when a model is loaded,
//! into [`ResolvedRegion`]; the transform has a single code path.

use crate::error::{Error, Result};
use crate::geometry::{BoundingBox, PixelRect};
use crate::orientation::{Orientation, Rotation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Pixels added around every sub-region crop
pub const DEFAULT_REGION_PADDING: i64 = 5;

/// Rectangle in fractions of an enclosing box, `[0,1]` on both axes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Re-express the rectangle after the enclosing box turned clockwise
    pub fn rotated(&self, rotation: Rotation) -> Self {
        let Self {
            x,
            y,
            width: w,
            height: h,
        } = *self;
        match rotation {
            Rotation::Deg0 => *self,
            Rotation::Deg90 => Self::new(1.0 - y - h, x, h, w),
            Rotation::Deg180 => Self::new(1.0 - x - w, 1.0 - y - h, w, h),
            Rotation::Deg270 => Self::new(y, 1.0 - x - w, h, w),
        }
    }

    /// Horizontal flip inside the enclosing box
    pub fn mirrored(&self) -> Self {
        Self::new(1.0 - self.x - self.width, self.y, self.width, self.height)
    }

    /// Training frame to detection frame: rotate first, then mirror
    pub fn to_detection_frame(&self, orientation: Orientation) -> Self {
        let rotated = self.rotated(orientation.rotation);
        if orientation.mirrored {
            rotated.mirrored()
        } else {
            rotated
        }
    }

    /// Detection frame back to training frame: un-mirror, then inverse rotation
    pub fn from_detection_frame(&self, orientation: Orientation) -> Self {
        let unmirrored = if orientation.mirrored {
            self.mirrored()
        } else {
            *self
        };
        unmirrored.rotated(orientation.rotation.inverse())
    }

    /// Page-fraction rectangle of this region inside `bbox`
    pub fn project(&self, bbox: &BoundingBox) -> RelativeRect {
        RelativeRect::new(
            bbox.x() + self.x * bbox.width(),
            bbox.y() + self.y * bbox.height(),
            self.width * bbox.width(),
            self.height * bbox.height(),
        )
    }

    /// Truncating conversion of a page-fraction rectangle to pixels
    pub fn to_pixels(&self, raster_width: u32, raster_height: u32) -> PixelRect {
        let w = raster_width as f64;
        let h = raster_height as f64;
        PixelRect::new(
            (self.x * w) as i64,
            (self.y * h) as i64,
            (self.width * w) as i64,
            (self.height * h) as i64,
        )
    }

    pub fn approx_eq(&self, other: &RelativeRect, tolerance: f64) -> bool {
        (self.x - other.x).abs() <= tolerance
            && (self.y - other.y).abs() <= tolerance
            && (self.width - other.width).abs() <= tolerance
            && (self.height - other.height).abs() <= tolerance
    }
}

/// Pixel size of the box a class was annotated with
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxSize {
    pub width: f64,
    pub height: f64,
}

impl BoxSize {
    pub fn aspect(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            0.0
        }
    }
}

/// Stored sub-region, in either of the two formats models were saved with
///
/// The training-relative format is tried first; anything carrying plain
/// `x/y/width/height` keys is the legacy detection-relative format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionSpec {
    #[serde(rename_all = "camelCase")]
    TrainingRelative {
        relative_x: f64,
        relative_y: f64,
        relative_width: f64,
        relative_height: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        training_box_size: Option<BoxSize>,
    },
    Legacy {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
}

impl RegionSpec {
    /// Resolve into the canonical representation
    ///
    /// `class_box` is the per-class training box size from model metadata,
    /// used when the region does not carry its own.
    pub fn resolve(&self, name: impl Into<String>, class_box: Option<BoxSize>) -> ResolvedRegion {
        let name = name.into();
        match *self {
            RegionSpec::TrainingRelative {
                relative_x,
                relative_y,
                relative_width,
                relative_height,
                training_box_size,
            } => ResolvedRegion {
                name,
                rect: RelativeRect::new(relative_x, relative_y, relative_width, relative_height),
                training_box: training_box_size.or(class_box),
            },
            RegionSpec::Legacy {
                x,
                y,
                width,
                height,
            } => ResolvedRegion {
                name,
                rect: RelativeRect::new(x, y, width, height),
                training_box: None,
            },
        }
    }
}

/// Canonical sub-region: fractions of the upright, unmirrored training box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRegion {
    pub name: String,
    pub rect: RelativeRect,
    pub training_box: Option<BoxSize>,
}

impl ResolvedRegion {
    /// Page-fraction rectangle of this region on a detection
    pub fn page_rect(&self, bbox: &BoundingBox, orientation: Orientation) -> RelativeRect {
        self.rect.to_detection_frame(orientation).project(bbox)
    }

    /// Clamped pixel crop rectangle for this region on a detection
    pub fn crop_rect(
        &self,
        bbox: &BoundingBox,
        orientation: Orientation,
        raster_width: u32,
        raster_height: u32,
        padding: i64,
    ) -> Result<PixelRect> {
        if let Some(training) = self.training_box {
            let px_w = bbox.width() * raster_width as f64;
            let px_h = bbox.height() * raster_height as f64;
            let live = if orientation.rotation.is_quarter_turn() {
                px_h / px_w
            } else {
                px_w / px_h
            };
            if training.aspect() > 0.0 && (live / training.aspect() - 1.0).abs() > 0.25 {
                debug!(
                    "[{}] detection aspect {:.2} differs from training aspect {:.2}",
                    self.name,
                    live,
                    training.aspect()
                );
            }
        }

        let rect = self
            .page_rect(bbox, orientation)
            .to_pixels(raster_width, raster_height)
            .padded(padding)
            .clamp_to(raster_width, raster_height);

        debug!(
            "[{}] {} -> x={}, y={}, w={}, h={}",
            self.name, orientation, rect.x, rect.y, rect.width, rect.height
        );

        if rect.is_empty() {
            return Err(Error::MalformedRegion {
                name: self.name.clone(),
                reason: format!("empty crop {}x{} at ({}, {})", rect.width, rect.height, rect.x, rect.y),
            });
        }
        Ok(rect)
    }
}
