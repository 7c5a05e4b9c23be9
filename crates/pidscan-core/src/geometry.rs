//! Bounding box algebra in normalized page-fraction units
//!
//! Every other component reasons about boxes through this module: matching
//! converts pixel hits into [`BoundingBox`], deduplication compares them, and
//! sub-region mapping projects rectangles through them back into pixels.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Axis-aligned box in `[0,1]` page fractions, origin top-left
///
/// Width and height are always positive. `x + width <= 1` is expected but not
/// enforced; consumers clamp when converting to pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBox", into = "RawBox")]
pub struct BoundingBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

#[derive(Serialize, Deserialize)]
struct RawBox {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

impl TryFrom<RawBox> for BoundingBox {
    type Error = Error;

    fn try_from(raw: RawBox) -> Result<Self> {
        BoundingBox::new(raw.x, raw.y, raw.width, raw.height)
    }
}

impl From<BoundingBox> for RawBox {
    fn from(b: BoundingBox) -> Self {
        RawBox {
            x: b.x,
            y: b.y,
            width: b.width,
            height: b.height,
        }
    }
}

impl BoundingBox {
    /// Create a box, rejecting non-positive or non-finite extents
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Result<Self> {
        let finite = x.is_finite() && y.is_finite() && width.is_finite() && height.is_finite();
        if !finite || width <= 0.0 || height <= 0.0 {
            return Err(Error::InvalidBoundingBox {
                x,
                y,
                width,
                height,
            });
        }
        Ok(Self {
            x,
            y,
            width,
            height,
        })
    }

    /// Create from a pixel rectangle on a raster of the given size
    pub fn from_pixels(rect: PixelRect, raster_width: u32, raster_height: u32) -> Result<Self> {
        let w = raster_width as f64;
        let h = raster_height as f64;
        Self::new(
            rect.x as f64 / w,
            rect.y as f64 / h,
            rect.width as f64 / w,
            rect.height as f64 / h,
        )
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Center point `(cx, cy)`
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Larger of width and height; the unit for center-distance duplicate tests
    pub fn max_extent(&self) -> f64 {
        self.width.max(self.height)
    }

    /// Euclidean distance between the two centers
    pub fn center_distance(&self, other: &BoundingBox) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
    }

    /// Intersection over union; 0 for disjoint boxes
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 { intersection / union } else { 0.0 }
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.right() && y >= self.y && y <= self.bottom()
    }

    /// Whether `other` lies entirely inside this box
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Scale width and height by `factor` keeping the center fixed
    pub fn scaled_about_center(&self, factor: f64) -> Result<Self> {
        let (cx, cy) = self.center();
        let w = self.width * factor;
        let h = self.height * factor;
        Self::new(cx - w / 2.0, cy - h / 2.0, w, h)
    }

    /// Convert to pixels on a raster of the given size, truncating like the
    /// integer casts used when cropping
    pub fn to_pixels(&self, raster_width: u32, raster_height: u32) -> PixelRect {
        let w = raster_width as f64;
        let h = raster_height as f64;
        PixelRect {
            x: (self.x * w) as i64,
            y: (self.y * h) as i64,
            width: (self.width * w) as i64,
            height: (self.height * h) as i64,
        }
    }
}

/// Integer pixel rectangle; may be negative or empty until clamped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl PixelRect {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Grow by `padding` pixels on every side
    pub fn padded(&self, padding: i64) -> Self {
        Self {
            x: self.x - padding,
            y: self.y - padding,
            width: self.width + padding * 2,
            height: self.height + padding * 2,
        }
    }

    /// Clamp to `[0, width) x [0, height)`; extents may become zero or negative
    pub fn clamp_to(&self, raster_width: u32, raster_height: u32) -> Self {
        let x = self.x.max(0);
        let y = self.y.max(0);
        Self {
            x,
            y,
            width: self.width.min(raster_width as i64 - x),
            height: self.height.min(raster_height as i64 - y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> i64 {
        if self.is_empty() { 0 } else { self.width * self.height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bb(x: f64, y: f64, w: f64, h: f64) -> BoundingBox {
        BoundingBox::new(x, y, w, h).unwrap()
    }

    #[test]
    fn test_iou_self_is_one() {
        let a = bb(0.1, 0.2, 0.3, 0.05);
        assert!((a.iou(&a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = bb(0.0, 0.0, 0.1, 0.1);
        let b = bb(0.5, 0.5, 0.1, 0.1);
        assert_eq!(a.iou(&b), 0.0);
        // touching edges do not overlap
        let c = bb(0.1, 0.0, 0.1, 0.1);
        assert_eq!(a.iou(&c), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = bb(0.0, 0.0, 0.2, 0.2);
        let b = bb(0.1, 0.1, 0.2, 0.2);
        // intersection 0.01, union 0.07
        assert!((a.iou(&b) - 0.01 / 0.07).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_degenerate_boxes() {
        assert!(matches!(
            BoundingBox::new(0.1, 0.1, 0.0, 0.2),
            Err(Error::InvalidBoundingBox { .. })
        ));
        assert!(BoundingBox::new(0.1, 0.1, 0.2, -0.1).is_err());
        assert!(BoundingBox::new(f64::NAN, 0.1, 0.2, 0.1).is_err());
    }

    #[test]
    fn test_deserialize_enforces_invariant() {
        let ok: BoundingBox =
            serde_json::from_str(r#"{"x":0.1,"y":0.2,"width":0.3,"height":0.4}"#).unwrap();
        assert_eq!(ok.width(), 0.3);
        let bad = serde_json::from_str::<BoundingBox>(r#"{"x":0.1,"y":0.2,"width":0,"height":0.4}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_center_and_extent() {
        let a = bb(0.2, 0.4, 0.2, 0.1);
        let (cx, cy) = a.center();
        assert!((cx - 0.3).abs() < 1e-12);
        assert!((cy - 0.45).abs() < 1e-12);
        assert_eq!(a.max_extent(), 0.2);
    }

    #[test]
    fn test_containment() {
        let outer = bb(0.1, 0.1, 0.5, 0.5);
        let inner = bb(0.2, 0.2, 0.1, 0.1);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
        assert!(outer.contains_point(0.6, 0.6));
    }

    #[test]
    fn test_pixel_padding_and_clamp() {
        let rect = PixelRect::new(2, 3, 10, 10).padded(5).clamp_to(100, 12);
        assert_eq!(rect, PixelRect::new(0, 0, 20, 12));

        let outside = PixelRect::new(120, 5, 10, 10).clamp_to(100, 100);
        assert!(outside.is_empty());
    }

    #[test]
    fn test_scaled_about_center() {
        let a = bb(0.4, 0.4, 0.2, 0.2).scaled_about_center(1.5).unwrap();
        assert!((a.x() - 0.35).abs() < 1e-12);
        assert!((a.width() - 0.3).abs() < 1e-12);
        let (cx, cy) = a.center();
        assert!((cx - 0.5).abs() < 1e-12 && (cy - 0.5).abs() < 1e-12);
    }
}
