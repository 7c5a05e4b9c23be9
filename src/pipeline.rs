//! Multi-model detection over the pages of one drawing

use crate::Result;
use crate::config::PipelineConfig;
use crate::fullpage;
use crate::ocr::InstanceReader;
use crate::report::{DetectionReport, FailureScope, UnitFailure};
use opencv::core::Mat;
use pidscan_core::{Detection, Error, TextItem, suppress_cross_model};
use pidscan_cv::traits::{OcrEngine, Rasterizer};
use pidscan_cv::{ModelCache, TemplateMatcher, TrainedModel};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Turn a unit's error into a scoped failure, or escalate a precondition violation
fn unit_error(err: anyhow::Error, fallback: impl FnOnce(String) -> Error) -> Result<Error> {
    match err.downcast::<Error>() {
        Ok(e) if e.is_precondition() => Err(e.into()),
        Ok(e) => Ok(e),
        Err(other) => Ok(fallback(format!("{:#}", other))),
    }
}

/// Symbol detection and text enrichment pipeline
pub struct Pipeline {
    config: PipelineConfig,
    rasterizer: Arc<dyn Rasterizer>,
    models: Arc<ModelCache>,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        rasterizer: Arc<dyn Rasterizer>,
        models: Arc<ModelCache>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            models,
            ocr: None,
        }
    }

    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Detect every requested model on every requested page
    ///
    /// Failures confined to a model, page, template, instance or sub-region
    /// are collected in the report. Only a precondition violation returns `Err`.
    pub fn detect<S: AsRef<str>>(
        &self,
        drawing: &Path,
        pages: &[usize],
        model_ids: &[S],
    ) -> Result<DetectionReport> {
        let mut report = DetectionReport::default();

        let models = self.load_models(model_ids, &mut report.failures)?;
        if models.is_empty() {
            warn!("No usable models for {:?}", drawing);
            return Ok(report);
        }

        let mut detections = Vec::new();
        for &page in pages {
            detections.extend(self.detect_page(drawing, page, &models, &mut report.failures)?);
        }

        let before = detections.len();
        report.detections = suppress_cross_model(detections, &self.config.nms);
        info!(
            "{:?}: {} detections from {} models ({} before cross-model suppression)",
            drawing,
            report.detections.len(),
            models.len(),
            before
        );

        self.enrich(drawing, &models, &mut report)?;
        Ok(report)
    }

    /// Read all text on one page in both orientations
    pub fn read_page_text(&self, drawing: &Path, page: usize) -> Result<Vec<TextItem>> {
        let engine = self
            .ocr
            .as_deref()
            .ok_or_else(|| Error::OcrUnavailable("no OCR engine configured".into()))?;
        let raster = self
            .rasterizer
            .render_page(drawing, page, self.config.detection_dpi)?;
        fullpage::read_page_text(engine, &raster, page, &self.config.text_dedup)
    }

    fn load_models<S: AsRef<str>>(
        &self,
        model_ids: &[S],
        failures: &mut Vec<UnitFailure>,
    ) -> Result<Vec<Arc<TrainedModel>>> {
        let mut models: Vec<Arc<TrainedModel>> = Vec::with_capacity(model_ids.len());
        let mut seen = BTreeSet::new();
        for id in model_ids {
            let id = id.as_ref();
            if !seen.insert(id) {
                continue;
            }
            match self.models.get(id) {
                Ok(model) => models.push(model),
                Err(err) => {
                    warn!("Model {} unavailable: {:#}", id, err);
                    let error = unit_error(err, |_| Error::ModelUnavailable(id.to_string()))?;
                    failures.push(UnitFailure::new(
                        FailureScope::Model {
                            model_id: id.to_string(),
                        },
                        error,
                    ));
                }
            }
        }
        Ok(models)
    }

    fn render(&self, drawing: &Path, page: usize, dpi: u32) -> Result<std::result::Result<Mat, Error>> {
        match self.rasterizer.render_page(drawing, page, dpi) {
            Ok(raster) => Ok(Ok(raster)),
            Err(err) => {
                warn!("Page {} @ {} DPI unavailable: {:#}", page, dpi, err);
                let error = unit_error(err, |reason| Error::PageUnavailable { page, reason })?;
                Ok(Err(error))
            }
        }
    }

    fn detect_page(
        &self,
        drawing: &Path,
        page: usize,
        models: &[Arc<TrainedModel>],
        failures: &mut Vec<UnitFailure>,
    ) -> Result<Vec<Detection>> {
        let raster = match self.render(drawing, page, self.config.detection_dpi)? {
            Ok(raster) => raster,
            Err(error) => {
                failures.push(UnitFailure::new(FailureScope::Page { page }, error));
                return Ok(Vec::new());
            }
        };

        let mut detections = Vec::new();
        for model in models {
            let threshold = self.config.threshold_for(&model.model_id);
            let matcher = TemplateMatcher::new(self.config.matcher.clone().with_threshold(threshold));

            match matcher.match_model(&raster, model, page, &self.config.nms) {
                Ok(matches) => {
                    for error in matches.rejected {
                        let label = match &error {
                            Error::TemplateTooPermissive { label, .. } => label.clone(),
                            _ => String::new(),
                        };
                        failures.push(UnitFailure::new(
                            FailureScope::Template {
                                model_id: model.model_id.clone(),
                                page,
                                label,
                            },
                            error,
                        ));
                    }
                    detections.extend(matches.detections);
                }
                Err(err) => {
                    warn!("{} failed on page {}: {:#}", model.model_id, page, err);
                    let error = unit_error(err, |reason| Error::PageUnavailable { page, reason })?;
                    failures.push(UnitFailure::new(FailureScope::Page { page }, error));
                }
            }
        }
        Ok(detections)
    }

    /// Attach text to every detection whose model has OCR enabled
    fn enrich(
        &self,
        drawing: &Path,
        models: &[Arc<TrainedModel>],
        report: &mut DetectionReport,
    ) -> Result<()> {
        let mut by_page: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (index, det) in report.detections.iter().enumerate() {
            if self.config.ocr_enabled_for(&det.model_id) {
                by_page.entry(det.page).or_default().push(index);
            }
        }
        if by_page.is_empty() {
            return Ok(());
        }

        let Some(engine) = self.ocr.as_deref() else {
            warn!("OCR requested but no engine is configured; detections keep empty text");
            report.failures.push(UnitFailure::new(
                FailureScope::Engine,
                Error::OcrUnavailable("no OCR engine configured".into()),
            ));
            return Ok(());
        };
        let reader = InstanceReader::new(engine, &self.config)?;

        for (page, indices) in by_page {
            let raster = match self.render(drawing, page, self.config.ocr_dpi)? {
                Ok(raster) => raster,
                Err(error) => {
                    report
                        .failures
                        .push(UnitFailure::new(FailureScope::Page { page }, error));
                    continue;
                }
            };

            for index in indices {
                let det = &mut report.detections[index];
                let regions = models
                    .iter()
                    .find(|m| m.model_id == det.model_id)
                    .map(|m| m.regions(&det.label))
                    .unwrap_or_default();

                if regions.is_empty() {
                    match reader.read_whole_box(&raster, det) {
                        Ok(text) => {
                            det.attach_text(text);
                        }
                        Err(error) if error.is_precondition() => return Err(error.into()),
                        Err(error) => {
                            debug!("OCR failed for {}: {}", det, error);
                            report
                                .failures
                                .push(UnitFailure::new(FailureScope::Instance { index }, error));
                        }
                    }
                    continue;
                }

                let readout = reader.read_regions(&raster, det, regions);
                for (name, error) in readout.failures {
                    report
                        .failures
                        .push(UnitFailure::new(FailureScope::SubRegion { index, name }, error));
                }
                det.attach_subclass_values(readout.values);
                if let Some(text) = readout.primary {
                    det.attach_text(text);
                }
            }
        }
        Ok(())
    }
}
