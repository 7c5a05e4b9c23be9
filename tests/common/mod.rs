#![allow(dead_code)]

use anyhow::{anyhow, Result};
use opencv::core::{Mat, Scalar, CV_8UC1};
use opencv::prelude::*;
use pidscan_core::{Orientation, PixelRect};
use pidscan_cv::template::preprocess;
use pidscan_cv::traits::{ModelStore, OcrEngine, OcrReading, PageTextSpan};
use pidscan_cv::utils::crop::crop;
use pidscan_cv::{Template, TrainedModel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub const PAGE_ROWS: i32 = 160;
pub const PAGE_COLS: i32 = 240;
/// Block-aligned symbol location on the synthetic page
pub const SYMBOL: PixelRect = PixelRect {
    x: 80,
    y: 40,
    width: 40,
    height: 40,
};

/// Grayscale page made of random `block`x`block` tiles
pub fn block_noise(rows: i32, cols: i32, block: i32, seed: u64) -> Result<Mat> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut mat = Mat::new_rows_cols_with_default(rows, cols, CV_8UC1, Scalar::all(0.0))?;
    for by in (0..rows).step_by(block as usize) {
        for bx in (0..cols).step_by(block as usize) {
            let value: u8 = rng.gen_range(0..=255);
            for y in by..(by + block).min(rows) {
                for x in bx..(bx + block).min(cols) {
                    *mat.at_2d_mut::<u8>(y, x)? = value;
                }
            }
        }
    }
    Ok(mat)
}

pub fn synthetic_page(seed: u64) -> Result<Mat> {
    block_noise(PAGE_ROWS, PAGE_COLS, 4, seed)
}

/// Preprocessed crop of a page, as the matcher sees it
pub fn prepared_crop(page: &Mat, rect: PixelRect) -> Result<Mat> {
    crop(&preprocess(page, 3)?, rect)
}

/// Model with one upright template cut from `page`
pub fn model_from(model_id: &str, label: &str, page: &Mat, rect: PixelRect) -> Result<TrainedModel> {
    let mut model = TrainedModel::new(model_id);
    model.add_templates([Template::new(
        label,
        prepared_crop(page, rect)?,
        Orientation::UPRIGHT,
    )]);
    Ok(model)
}

pub fn scratch_dir(name: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!("pidscan-it-{}-{}", name, std::process::id()));
    if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Write a grayscale page under `root/<drawing>/page_<n>.png`
pub fn write_page(root: &std::path::Path, drawing: &str, page_index: usize, mat: &Mat) -> Result<()> {
    let dir = root.join(drawing);
    std::fs::create_dir_all(&dir)?;
    let bytes = mat.data_bytes()?.to_vec();
    let image = image::GrayImage::from_raw(mat.cols() as u32, mat.rows() as u32, bytes)
        .ok_or_else(|| anyhow!("raster does not fit a gray image"))?;
    image.save(dir.join(format!("page_{}.png", page_index)))?;
    Ok(())
}

/// Model store backed by a map
#[derive(Default)]
pub struct MemoryStore {
    models: HashMap<String, TrainedModel>,
}

impl MemoryStore {
    pub fn with(mut self, model: TrainedModel) -> Self {
        self.models.insert(model.model_id.clone(), model);
        self
    }
}

impl ModelStore for MemoryStore {
    fn load(&self, model_id: &str) -> Result<Option<TrainedModel>> {
        Ok(self.models.get(model_id).cloned())
    }
}

/// OCR engine replaying canned answers
#[derive(Default)]
pub struct ScriptedOcr {
    readings: Mutex<VecDeque<OcrReading>>,
    fail: bool,
    horizontal: Vec<PageTextSpan>,
    vertical: Vec<PageTextSpan>,
    pub recognized: AtomicUsize,
}

impl ScriptedOcr {
    pub fn replying(readings: impl IntoIterator<Item = OcrReading>) -> Self {
        Self {
            readings: Mutex::new(readings.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    /// Spans returned for landscape and portrait page rasters respectively
    pub fn with_page_spans(mut self, horizontal: Vec<PageTextSpan>, vertical: Vec<PageTextSpan>) -> Self {
        self.horizontal = horizontal;
        self.vertical = vertical;
        self
    }

    pub fn recognized(&self) -> usize {
        self.recognized.load(Ordering::SeqCst)
    }
}

impl OcrEngine for ScriptedOcr {
    fn recognize(&self, _crop: &Mat) -> Result<OcrReading> {
        self.recognized.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("engine crashed"));
        }
        let mut readings = self
            .readings
            .lock()
            .map_err(|_| anyhow!("script lock poisoned"))?;
        Ok(readings
            .pop_front()
            .unwrap_or_else(|| OcrReading::new("", 0.0)))
    }

    fn read_page(&self, page: &Mat) -> Result<Vec<PageTextSpan>> {
        if page.cols() >= page.rows() {
            Ok(self.horizontal.clone())
        } else {
            Ok(self.vertical.clone())
        }
    }
}

pub fn span(text: &str, rect: PixelRect, confidence: f64) -> PageTextSpan {
    PageTextSpan {
        rect,
        text: text.to_string(),
        confidence,
    }
}
