//! Text reading for detected instances

use crate::config::PipelineConfig;
use opencv::core::Mat;
use pidscan_core::{Detection, Error, PixelRect, RecognizedText, ResolvedRegion, TagNormalizer, correct};
use pidscan_cv::ImageUtils;
use pidscan_cv::traits::OcrEngine;
use pidscan_cv::utils::crop::{crop, upright_for_ocr, upscale, upscale_to_min_height};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Sub-region whose value becomes the detection text when present
pub const PRIMARY_REGION: &str = "Tag";

/// Values read from every sub-region of one detection
#[derive(Debug, Default)]
pub struct RegionReadout {
    pub values: BTreeMap<String, String>,
    /// Reading chosen as the detection text
    pub primary: Option<RecognizedText>,
    /// Regions that were skipped, keyed by region name
    pub failures: Vec<(String, Error)>,
}

/// Reads the text of detected instances from an OCR-resolution page
pub struct InstanceReader<'a> {
    engine: &'a dyn OcrEngine,
    config: &'a PipelineConfig,
    /// Present when unformatted text is normalized as a tag
    tags: Option<TagNormalizer>,
}

impl<'a> InstanceReader<'a> {
    pub fn new(engine: &'a dyn OcrEngine, config: &'a PipelineConfig) -> anyhow::Result<Self> {
        let tags = if config.normalize_unformatted {
            Some(TagNormalizer::new()?)
        } else {
            None
        };
        Ok(Self { engine, config, tags })
    }

    /// Recognize the whole detection box and correct it with the class format
    pub fn read_whole_box(&self, page: &Mat, det: &Detection) -> Result<RecognizedText, Error> {
        let (w, h) = ImageUtils::dimensions(page);
        let rect = det
            .bbox
            .scaled_about_center(self.config.ocr_crop.padding_factor)?
            .to_pixels(w, h)
            .clamp_to(w, h);

        if rect.is_empty() {
            return Err(Error::OcrFailed(format!(
                "empty crop for {} at ({:.3}, {:.3})",
                det.label,
                det.bbox.x(),
                det.bbox.y()
            )));
        }

        let (raw, confidence) = self.recognize(page, rect, det, |upright| {
            upscale_to_min_height(
                upright,
                self.config.ocr_crop.min_text_height,
                self.config.ocr_crop.max_upscale,
            )
        })?;

        let format = self.config.formats.lookup(&det.model_id, &det.label);
        Ok(apply_format(raw, confidence, format, self.tags.as_ref(), &det.label))
    }

    /// Read every configured sub-region of a detection
    ///
    /// A region that fails contributes an empty value and a failure; the
    /// remaining regions are still read.
    pub fn read_regions(
        &self,
        page: &Mat,
        det: &Detection,
        regions: &[ResolvedRegion],
    ) -> RegionReadout {
        let (w, h) = ImageUtils::dimensions(page);
        let mut readout = RegionReadout::default();
        let mut readings: BTreeMap<String, RecognizedText> = BTreeMap::new();

        for region in regions {
            let outcome = region
                .crop_rect(
                    &det.bbox,
                    det.orientation,
                    w,
                    h,
                    self.config.ocr_crop.region_padding,
                )
                .and_then(|rect| {
                    self.recognize(page, rect, det, |upright| {
                        upscale(upright, self.config.ocr_crop.region_upscale)
                    })
                });

            match outcome {
                Ok((raw, confidence)) => {
                    let format = self.config.subclass_format(&det.model_id, &region.name);
                    let text = apply_format(raw, confidence, format, self.tags.as_ref(), &region.name);
                    readout
                        .values
                        .insert(region.name.clone(), text.corrected.clone());
                    readings.insert(region.name.clone(), text);
                }
                Err(err) => {
                    debug!("[{}] skipped: {}", region.name, err);
                    readout.values.insert(region.name.clone(), String::new());
                    readout.failures.push((region.name.clone(), err));
                }
            }
        }

        // a configured Tag that failed leaves the detection without text
        readout.primary = if regions.iter().any(|r| r.name == PRIMARY_REGION) {
            readings.remove(PRIMARY_REGION)
        } else {
            readings.into_values().next()
        };
        readout
    }

    /// Crop, turn upright, rescale and recognize one rectangle
    fn recognize<F>(
        &self,
        page: &Mat,
        rect: PixelRect,
        det: &Detection,
        rescale: F,
    ) -> Result<(String, f64), Error>
    where
        F: Fn(&Mat) -> anyhow::Result<Mat>,
    {
        let prepared = crop(page, rect)
            .and_then(|c| upright_for_ocr(&c, det.orientation))
            .and_then(|c| rescale(&c))
            .map_err(|e| Error::OcrFailed(format!("{:#}", e)))?;

        let reading = self
            .engine
            .recognize(&prepared)
            .map_err(|e| Error::OcrFailed(format!("{:#}", e)))?;

        Ok((clean_text(&reading.text), reading.confidence))
    }
}

/// Collapse line breaks and trim the engine output
pub fn clean_text(raw: &str) -> String {
    raw.replace(['\r', '\n'], " ").trim().to_string()
}

fn apply_format(
    raw: String,
    confidence: f64,
    format: Option<&str>,
    tags: Option<&TagNormalizer>,
    what: &str,
) -> RecognizedText {
    if raw.is_empty() {
        return RecognizedText::uncorrected(raw, confidence);
    }
    let corrected = match (format, tags) {
        (Some(template), _) => correct(&raw, template),
        (None, Some(tags)) => tags.normalize(&raw),
        (None, None) => return RecognizedText::uncorrected(raw, confidence),
    };
    if corrected != raw {
        info!("[{}] corrected '{}' -> '{}'", what, raw, corrected);
    }
    RecognizedText::new(raw, corrected, confidence)
}
