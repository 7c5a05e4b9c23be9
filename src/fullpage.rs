//! Full-page text extraction in two reading orientations
//!
//! Vertical text is read from a copy of the page rotated a quarter-turn
//! clockwise. Its spans are projected back onto the unrotated page before
//! both passes are deduplicated together.

use crate::Result;
use opencv::core::Mat;
use pidscan_core::{
    BoundingBox, PixelRect, Rotation, TextDedupConfig, TextItem, TextOrientation,
    dedup_text_items,
};
use pidscan_cv::ImageUtils;
use pidscan_cv::traits::{OcrEngine, PageTextSpan};
use pidscan_cv::utils::crop::rotate;
use pidscan_cv::utils::enhance::enhance_for_text;
use tracing::{debug, info};

/// Corners `(x_min, y_min, x_max, y_max)` on the unrotated page of a span read
/// on a clockwise-rotated copy `rotated_width` pixels wide
pub fn unrotate_clockwise(rect: PixelRect, rotated_width: u32) -> (f64, f64, f64, f64) {
    let rot_w = rotated_width as f64;
    let x_min = rect.x as f64;
    let x_max = (rect.x + rect.width) as f64;
    let y_min = rect.y as f64;
    let y_max = (rect.y + rect.height) as f64;

    (y_min, rot_w - x_max, y_max, rot_w - x_min)
}

fn to_item(
    corners: (f64, f64, f64, f64),
    span: &PageTextSpan,
    page_w: u32,
    page_h: u32,
    orientation: TextOrientation,
    page_index: usize,
) -> Option<TextItem> {
    let (x_min, y_min, x_max, y_max) = corners;
    let w = page_w as f64;
    let h = page_h as f64;
    match BoundingBox::new(x_min / w, y_min / h, (x_max - x_min) / w, (y_max - y_min) / h) {
        Ok(bbox) => Some(
            TextItem::new(span.text.trim(), span.confidence, bbox, orientation).on_page(page_index),
        ),
        Err(err) => {
            debug!("Dropping span '{}': {}", span.text, err);
            None
        }
    }
}

/// Read all text on a page raster, horizontal and vertical
pub fn read_page_text(
    engine: &dyn OcrEngine,
    page: &Mat,
    page_index: usize,
    config: &TextDedupConfig,
) -> Result<Vec<TextItem>> {
    let enhanced = enhance_for_text(page)?;
    let (page_w, page_h) = ImageUtils::dimensions(&enhanced);

    let mut items = Vec::new();

    for span in engine.read_page(&enhanced)? {
        if span.text.trim().is_empty() {
            continue;
        }
        let r = span.rect;
        let corners = (
            r.x as f64,
            r.y as f64,
            (r.x + r.width) as f64,
            (r.y + r.height) as f64,
        );
        items.extend(to_item(
            corners,
            &span,
            page_w,
            page_h,
            TextOrientation::Horizontal,
            page_index,
        ));
    }
    let horizontal = items.len();

    let rotated = rotate(&enhanced, Rotation::Deg90)?;
    let (rot_w, _) = ImageUtils::dimensions(&rotated);
    for span in engine.read_page(&rotated)? {
        if span.text.trim().is_empty() {
            continue;
        }
        let corners = unrotate_clockwise(span.rect, rot_w);
        items.extend(to_item(
            corners,
            &span,
            page_w,
            page_h,
            TextOrientation::Vertical,
            page_index,
        ));
    }

    let found = items.len();
    let items = dedup_text_items(items, config);
    info!(
        "Page {}: {} horizontal + {} vertical spans -> {} text items",
        page_index,
        horizontal,
        found - horizontal,
        items.len()
    );
    Ok(items)
}
