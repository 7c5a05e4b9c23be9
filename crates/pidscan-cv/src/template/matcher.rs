//! Template matching implementation using OpenCV normalized cross-correlation

use super::{MatcherConfig, Template, TrainedModel};
use crate::Result;
use crate::utils::ImageUtils;
use anyhow::Context;
use opencv::{
    core::{self, CV_64F, Mat, Size},
    imgproc,
    prelude::*,
};
use pidscan_core::{BoundingBox, Detection, Error, NmsConfig, PixelRect, suppress_single_model};
use tracing::{debug, warn};

/// Equalize contrast and apply a small Gaussian blur
///
/// Applied identically to pages and templates; scores between rasters
/// preprocessed differently are not comparable.
pub fn preprocess(image: &Mat, blur_kernel: i32) -> Result<Mat> {
    let gray = ImageUtils::to_grayscale(image)?;

    let mut equalized = Mat::default();
    imgproc::equalize_hist(&gray, &mut equalized).context("Histogram equalization failed")?;

    let mut blurred = Mat::default();
    imgproc::gaussian_blur_def(
        &equalized,
        &mut blurred,
        Size::new(blur_kernel, blur_kernel),
        0.0,
    )
    .context("Gaussian blur failed")?;

    Ok(blurred)
}

/// Detections of one model on one page, plus the templates it had to reject
#[derive(Debug, Default)]
pub struct ModelMatches {
    pub detections: Vec<Detection>,
    pub rejected: Vec<Error>,
}

/// OpenCV-based template matcher
pub struct TemplateMatcher {
    config: MatcherConfig,
}

impl TemplateMatcher {
    /// Create new template matcher
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Preprocess a page raster for matching
    pub fn prepare_page(&self, page: &Mat) -> Result<Mat> {
        preprocess(page, self.config.blur_kernel)
    }

    /// Raw candidates of one template variant on an already preprocessed page
    ///
    /// The outer `Result` carries OpenCV failures; the inner one reports
    /// a template rejected for exceeding the raw match cap.
    pub fn match_variant(
        &self,
        page: &Mat,
        template: &Template,
    ) -> Result<std::result::Result<Vec<Detection>, Error>> {
        let (page_w, page_h) = ImageUtils::dimensions(page);
        let (tmpl_w, tmpl_h) = template.size();

        if tmpl_w <= 0 || tmpl_h <= 0 || tmpl_w > page.cols() || tmpl_h > page.rows() {
            debug!(
                "Skipping {} ({}): template {}x{} does not fit page {}x{}",
                template.label, template.orientation, tmpl_w, tmpl_h, page_w, page_h
            );
            return Ok(Ok(Vec::new()));
        }

        let mut result = Mat::default();
        imgproc::match_template(
            page,
            &template.image,
            &mut result,
            imgproc::TM_CCOEFF_NORMED,
            &core::no_array(),
        )
        .context("Template matching failed")?;

        // Convert result to f64
        let mut result_f64 = Mat::default();
        result.convert_to(&mut result_f64, CV_64F, 1.0, 0.0)?;

        let cap = self.config.max_raw_matches;
        let mut hits: Vec<(i32, i32, f64)> = Vec::new();
        let mut total = 0usize;

        for y in 0..result_f64.rows() {
            for x in 0..result_f64.cols() {
                let score: f64 = *result_f64.at_2d(y, x)?;
                if score >= self.config.threshold {
                    total += 1;
                    if total <= cap {
                        hits.push((x, y, score));
                    }
                }
            }
        }

        if total > cap {
            warn!(
                "{} ({}): {} raw matches over cap {}, discarding template",
                template.label, template.orientation, total, cap
            );
            return Ok(Err(Error::TemplateTooPermissive {
                label: template.label.clone(),
                matches: total,
                cap,
            }));
        }

        debug!(
            "Checking {} ({}): {} matches",
            template.label,
            template.orientation,
            hits.len()
        );

        let mut detections = Vec::with_capacity(hits.len());
        for (x, y, score) in hits {
            let rect = PixelRect::new(x as i64, y as i64, tmpl_w as i64, tmpl_h as i64);
            let bbox = BoundingBox::from_pixels(rect, page_w, page_h)?;
            detections.push(
                Detection::new(bbox, template.label.clone(), score)
                    .with_orientation(template.orientation),
            );
        }

        Ok(Ok(detections))
    }

    /// Run every variant of a model on one page, then suppress duplicates
    pub fn match_model(
        &self,
        page: &Mat,
        model: &TrainedModel,
        page_index: usize,
        nms: &NmsConfig,
    ) -> Result<ModelMatches> {
        let prepared = self.prepare_page(page)?;
        let templates: Vec<&Template> = model.all_templates().collect();

        #[cfg(feature = "parallel")]
        let outcomes: Vec<std::result::Result<Vec<Detection>, Error>> = {
            use rayon::prelude::*;
            templates
                .par_iter()
                .map(|template| self.match_variant(&prepared, template))
                .collect::<Result<Vec<_>>>()?
        };

        #[cfg(not(feature = "parallel"))]
        let outcomes: Vec<std::result::Result<Vec<Detection>, Error>> = templates
            .iter()
            .map(|template| self.match_variant(&prepared, template))
            .collect::<Result<Vec<_>>>()?;

        let mut raw = Vec::new();
        let mut rejected = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(candidates) => raw.extend(candidates),
                Err(err) => rejected.push(err),
            }
        }

        let raw: Vec<Detection> = raw
            .into_iter()
            .map(|det| det.on_page(page_index).from_model(model.model_id.clone()))
            .collect();
        let raw_count = raw.len();
        let detections = suppress_single_model(raw, nms);

        debug!(
            "{} page {}: {} raw -> {} detections",
            model.model_id,
            page_index,
            raw_count,
            detections.len()
        );

        Ok(ModelMatches {
            detections,
            rejected,
        })
    }
}

impl Default for TemplateMatcher {
    fn default() -> Self {
        Self::new(MatcherConfig::default())
    }
}
