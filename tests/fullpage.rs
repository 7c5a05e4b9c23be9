mod common;

use anyhow::Result;
use common::*;
use opencv::core::{Mat, Scalar, CV_8UC1};
use pidscan::fullpage::read_page_text;
use pidscan::{Pipeline, PipelineConfig};
use pidscan_core::{Error, PixelRect, TextDedupConfig, TextOrientation};
use pidscan_cv::{ImageDirRasterizer, ModelCache};
use std::path::Path;
use std::sync::Arc;

/// 400 wide, 200 tall; the rotated pass sees it 200 wide, 400 tall
fn blank_page() -> Result<Mat> {
    Ok(Mat::new_rows_cols_with_default(200, 400, CV_8UC1, Scalar::all(230.0))?)
}

#[test]
fn test_same_text_from_both_passes_is_merged() -> Result<()> {
    let ocr = ScriptedOcr::default().with_page_spans(
        vec![span("TI-101", PixelRect::new(100, 50, 60, 20), 0.9)],
        vec![
            // the same label seen on the rotated copy
            span("TI-1O1", PixelRect::new(130, 100, 20, 60), 0.6),
            // text that only reads vertically
            span("LT-7", PixelRect::new(20, 300, 20, 80), 0.8),
        ],
    );

    let items = read_page_text(&ocr, &blank_page()?, 2, &TextDedupConfig::default())?;
    assert_eq!(items.len(), 2);

    let tag = items.iter().find(|i| i.text.starts_with("TI")).unwrap();
    assert_eq!(tag.text, "TI-101");
    assert_eq!(tag.orientation, TextOrientation::Horizontal);
    assert!((tag.bbox.x() - 0.25).abs() < 1e-9);
    assert!((tag.bbox.y() - 0.25).abs() < 1e-9);

    let vertical = items.iter().find(|i| i.text == "LT-7").unwrap();
    assert_eq!(vertical.orientation, TextOrientation::Vertical);
    assert_eq!(vertical.page, 2);
    // x = 300..380, y = 160..180 on the unrotated page
    assert!((vertical.bbox.x() - 0.75).abs() < 1e-9);
    assert!((vertical.bbox.y() - 0.8).abs() < 1e-9);
    assert!((vertical.bbox.width() - 0.2).abs() < 1e-9);
    assert!((vertical.bbox.height() - 0.1).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_blank_and_degenerate_spans_are_dropped() -> Result<()> {
    let ocr = ScriptedOcr::default().with_page_spans(
        vec![
            span("   ", PixelRect::new(10, 10, 30, 10), 0.9),
            span("FI-7", PixelRect::new(10, 10, 0, 10), 0.9),
            span("FI-8", PixelRect::new(40, 40, 30, 10), 0.7),
        ],
        Vec::new(),
    );

    let items = read_page_text(&ocr, &blank_page()?, 0, &TextDedupConfig::default())?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].text, "FI-8");
    Ok(())
}

#[test]
fn test_page_text_needs_an_engine() -> Result<()> {
    let root = scratch_dir("fullpage-engine")?;
    write_page(&root, "drawing", 0, &synthetic_page(3)?)?;

    let pipeline = Pipeline::new(
        PipelineConfig::default(),
        Arc::new(ImageDirRasterizer::new(&root)),
        Arc::new(ModelCache::new(Arc::new(MemoryStore::default()))),
    );
    let err = pipeline.read_page_text(Path::new("drawing"), 0).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::OcrUnavailable(_))));

    let pipeline = pipeline.with_ocr(Arc::new(ScriptedOcr::default().with_page_spans(
        vec![span("PI-3", PixelRect::new(12, 12, 40, 12), 0.7)],
        Vec::new(),
    )));
    let items = pipeline.read_page_text(Path::new("drawing"), 0)?;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].orientation, TextOrientation::Horizontal);
    Ok(())
}
