//! Image loading and conversion using opencv-match conversions

use crate::Result;
use anyhow::{Context, bail};
use opencv::{core::Mat, imgproc, prelude::*};
use opencv_match::prelude::*;
use std::path::Path;

/// Image utility functions leveraging opencv-match conversions
pub struct ImageUtils;

impl ImageUtils {
    /// Load image as color Mat using opencv-match
    pub fn load_color<P: AsRef<Path>>(path: P) -> Result<Mat> {
        let img = image::open(&path)
            .with_context(|| format!("Failed to open image: {:?}", path.as_ref()))?
            .to_rgb8();

        img.try_into_cv()
            .context("Failed to convert image to OpenCV Mat")
    }

    /// Single-channel copy of a 1, 3 or 4 channel 8-bit raster
    pub fn to_grayscale(mat: &Mat) -> Result<Mat> {
        let code = match mat.channels() {
            1 => return Ok(mat.clone()),
            3 => imgproc::COLOR_BGR2GRAY,
            4 => imgproc::COLOR_BGRA2GRAY,
            n => bail!("Unsupported channel count for grayscale conversion: {}", n),
        };

        let mut gray = Mat::default();
        imgproc::cvt_color_def(mat, &mut gray, code).context("Grayscale conversion failed")?;
        Ok(gray)
    }

    /// Raster size as `(width, height)` in pixels
    pub fn dimensions(mat: &Mat) -> (u32, u32) {
        (mat.cols().max(0) as u32, mat.rows().max(0) as u32)
    }
}
