//! Crop extraction and orientation handling for OCR

use crate::Result;
use anyhow::{Context, bail};
use opencv::{
    core::{self, Mat, Rect, Size},
    imgproc,
    prelude::*,
};
use pidscan_core::{Orientation, PixelRect, Rotation};

/// Copy a pixel rectangle out of a raster
///
/// The rectangle must already be clamped to the raster and non-empty.
pub fn crop(image: &Mat, rect: PixelRect) -> Result<Mat> {
    if rect.is_empty() {
        bail!("Empty crop rectangle: {:?}", rect);
    }
    let roi = Rect::new(
        rect.x as i32,
        rect.y as i32,
        rect.width as i32,
        rect.height as i32,
    );
    if roi.x + roi.width > image.cols() || roi.y + roi.height > image.rows() {
        bail!(
            "Crop {:?} exceeds raster {}x{}",
            rect,
            image.cols(),
            image.rows()
        );
    }

    Ok(Mat::roi(image, roi)
        .with_context(|| format!("Failed to crop {:?}", rect))?
        .clone_pointee())
}

/// Clockwise quarter-turn rotation without interpolation
pub fn rotate(image: &Mat, rotation: Rotation) -> Result<Mat> {
    let code = match rotation {
        Rotation::Deg0 => return Ok(image.clone()),
        Rotation::Deg90 => core::ROTATE_90_CLOCKWISE,
        Rotation::Deg180 => core::ROTATE_180,
        Rotation::Deg270 => core::ROTATE_90_COUNTERCLOCKWISE,
    };

    let mut rotated = Mat::default();
    core::rotate(image, &mut rotated, code)
        .with_context(|| format!("Rotation by {} failed", rotation))?;
    Ok(rotated)
}

/// Mirror around the vertical axis
pub fn flip_horizontal(image: &Mat) -> Result<Mat> {
    let mut flipped = Mat::default();
    core::flip(image, &mut flipped, 1).context("Horizontal flip failed")?;
    Ok(flipped)
}

/// Turn a crop of a detected instance back to reading orientation
///
/// Only rotates; the pixels are never flipped.
pub fn upright_for_ocr(crop: &Mat, orientation: Orientation) -> Result<Mat> {
    rotate(crop, orientation.upright_correction())
}

/// Scale by `factor` with Lanczos interpolation
pub fn upscale(image: &Mat, factor: f64) -> Result<Mat> {
    if factor <= 1.0 {
        return Ok(image.clone());
    }
    let size = Size::new(
        (image.cols() as f64 * factor).round() as i32,
        (image.rows() as f64 * factor).round() as i32,
    );

    let mut scaled = Mat::default();
    imgproc::resize(image, &mut scaled, size, 0.0, 0.0, imgproc::INTER_LANCZOS4)
        .context("Upscale failed")?;
    Ok(scaled)
}

/// Upscale short crops so their height reaches `min_height`, capped at `max_factor`
pub fn upscale_to_min_height(image: &Mat, min_height: i32, max_factor: f64) -> Result<Mat> {
    let rows = image.rows();
    if rows <= 0 || rows >= min_height {
        return Ok(image.clone());
    }
    let factor = (min_height as f64 / rows as f64).min(max_factor);
    upscale(image, factor)
}
