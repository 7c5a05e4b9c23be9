//! Contrast enhancement ahead of full-page text detection

use super::ImageUtils;
use crate::Result;
use anyhow::Context;
use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
};

/// CLAHE parameters
#[derive(Debug, Clone, Copy)]
pub struct ClaheParams {
    pub clip_limit: f64,
    pub tile_size: (i32, i32),
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_size: (8, 8),
        }
    }
}

/// Apply CLAHE (Contrast Limited Adaptive Histogram Equalization)
pub fn apply_clahe(image: &Mat, params: ClaheParams) -> Result<Mat> {
    let gray = ImageUtils::to_grayscale(image)?;

    let mut clahe = imgproc::create_clahe(
        params.clip_limit,
        Size::new(params.tile_size.0, params.tile_size.1),
    )?;

    let mut equalized = Mat::default();
    clahe.apply(&gray, &mut equalized).context("CLAHE failed")?;

    Ok(equalized)
}

/// Grayscale CLAHE result expanded back to three channels
pub fn enhance_for_text(image: &Mat) -> Result<Mat> {
    let equalized = apply_clahe(image, ClaheParams::default())?;

    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&equalized, &mut bgr, imgproc::COLOR_GRAY2BGR)
        .context("Gray to BGR conversion failed")?;
    Ok(bgr)
}
