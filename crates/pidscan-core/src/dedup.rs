//! Deduplication passes
//!
//! Three passes share the same greedy maximum-confidence strategy: sort by
//! confidence, keep the best remaining candidate, drop everything it explains,
//! repeat. They differ in scope and in what counts as "explains":
//!
//! - [`suppress_single_model`]: one detector, one page, geometric only.
//! - [`suppress_cross_model`]: pooled detectors, partitioned by page first.
//! - [`dedup_text_items`]: full-page OCR, geometry gated by text similarity.

use crate::detection::{Detection, TextItem};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Which candidates the center-distance rule may suppress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CenterRule {
    /// Any label: rotated variants of one symbol alias to different labels
    #[default]
    AnyLabel,
    /// Only candidates sharing the keeper's label
    SameLabel,
}

/// Thresholds for detection NMS (passes a and b)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NmsConfig {
    /// Fraction of the keeper's max extent under which centers are duplicates
    pub center_factor: f64,
    /// IoU at or above which a candidate is a duplicate
    pub iou_threshold: f64,
    pub center_rule: CenterRule,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            center_factor: 0.5,
            iou_threshold: 0.5,
            center_rule: CenterRule::AnyLabel,
        }
    }
}

/// Thresholds for cross-orientation text dedup (pass c)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDedupConfig {
    /// Absolute center distance, in page fractions
    pub center_distance: f64,
    /// IoU strictly above which overlapping items are compared
    pub iou_threshold: f64,
    /// Positional character match ratio strictly above which texts agree
    pub similarity: f64,
}

impl Default for TextDedupConfig {
    fn default() -> Self {
        Self {
            center_distance: 0.02,
            iou_threshold: 0.3,
            similarity: 0.7,
        }
    }
}

fn sort_by_confidence(detections: &mut [Detection]) {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

fn is_duplicate(keeper: &Detection, candidate: &Detection, config: &NmsConfig) -> bool {
    let center_applies = match config.center_rule {
        CenterRule::AnyLabel => true,
        CenterRule::SameLabel => keeper.label == candidate.label,
    };
    if center_applies
        && keeper.bbox.center_distance(&candidate.bbox)
            < keeper.bbox.max_extent() * config.center_factor
    {
        return true;
    }
    keeper.bbox.iou(&candidate.bbox) >= config.iou_threshold
}

fn greedy_suppress(mut candidates: Vec<Detection>, config: &NmsConfig) -> Vec<Detection> {
    sort_by_confidence(&mut candidates);

    let mut keep: Vec<Detection> = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        for j in (i + 1)..candidates.len() {
            if !suppressed[j] && is_duplicate(&candidates[i], &candidates[j], config) {
                suppressed[j] = true;
            }
        }
        keep.push(candidates[i].clone());
    }

    keep
}

/// Pass (a): NMS over one detector's raw candidates on one page
pub fn suppress_single_model(candidates: Vec<Detection>, config: &NmsConfig) -> Vec<Detection> {
    if candidates.is_empty() {
        return candidates;
    }
    let before = candidates.len();
    let kept = greedy_suppress(candidates, config);
    debug!("single-model NMS: {} -> {}", before, kept.len());
    kept
}

/// Pass (b): NMS over detections pooled from several detectors
///
/// Candidates are grouped by page before suppression so an instance on one
/// page never suppresses an instance on another. Output is ordered by page.
pub fn suppress_cross_model(detections: Vec<Detection>, config: &NmsConfig) -> Vec<Detection> {
    let before = detections.len();

    let mut by_page: BTreeMap<usize, Vec<Detection>> = BTreeMap::new();
    for det in detections {
        by_page.entry(det.page).or_default().push(det);
    }

    let mut kept = Vec::with_capacity(before);
    for (_, page_dets) in by_page {
        kept.extend(greedy_suppress(page_dets, config));
    }

    debug!("cross-model NMS: {} -> {}", before, kept.len());
    kept
}

fn normalized(text: &str) -> String {
    text.trim().to_uppercase()
}

fn equal_or_nested(a: &str, b: &str) -> bool {
    a == b || a.contains(b) || b.contains(a)
}

/// Fraction of aligned character positions that agree, over the longer text
pub fn positional_similarity(a: &str, b: &str) -> f64 {
    let a_len = a.chars().count();
    let b_len = b.chars().count();
    if a_len == 0 || b_len == 0 {
        return 0.0;
    }
    let matches = a.chars().zip(b.chars()).filter(|(x, y)| x == y).count();
    matches as f64 / a_len.max(b_len) as f64
}

fn is_text_duplicate(item: &TextItem, kept: &TextItem, config: &TextDedupConfig) -> bool {
    let a = normalized(&item.text);
    let b = normalized(&kept.text);

    if item.bbox.center_distance(&kept.bbox) < config.center_distance
        && (equal_or_nested(&a, &b) || positional_similarity(&a, &b) > config.similarity)
    {
        return true;
    }

    item.bbox.iou(&kept.bbox) > config.iou_threshold && equal_or_nested(&a, &b)
}

/// Pass (c): merge text found by the native and the rotated full-page passes
///
/// Geometric agreement alone never merges two items; their texts must agree
/// too, so unrelated fragments that overlap are both kept.
pub fn dedup_text_items(mut items: Vec<TextItem>, config: &TextDedupConfig) -> Vec<TextItem> {
    items.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let before = items.len();
    let mut keep: Vec<TextItem> = Vec::new();
    for item in items {
        if !keep.iter().any(|kept| is_text_duplicate(&item, kept, config)) {
            keep.push(item);
        }
    }

    debug!("text dedup: {} -> {}", before, keep.len());
    keep
}
