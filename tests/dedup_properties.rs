use pidscan_core::{
    dedup_text_items, suppress_cross_model, suppress_single_model, BoundingBox, Detection,
    NmsConfig, TextDedupConfig, TextItem, TextOrientation,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_detections(rng: &mut StdRng, count: usize) -> Vec<Detection> {
    (0..count)
        .map(|i| {
            let w = rng.gen_range(0.01..0.08);
            let h = rng.gen_range(0.01..0.08);
            let x = rng.gen_range(0.0..0.3);
            let y = rng.gen_range(0.0..0.3);
            let bbox = BoundingBox::new(x, y, w, h).unwrap();
            Detection::new(bbox, if i % 2 == 0 { "FI" } else { "TI" }, rng.gen_range(0.5..1.0))
                .on_page(rng.gen_range(0..3))
        })
        .collect()
}

#[test]
fn test_nms_output_has_no_duplicates_and_is_stable() {
    let config = NmsConfig::default();
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..50 {
        let input = random_detections(&mut rng, 60);
        let best = input.iter().map(|d| d.confidence).fold(f64::MIN, f64::max);
        let kept = suppress_single_model(input, &config);

        assert_eq!(kept[0].confidence, best);
        for (i, keeper) in kept.iter().enumerate() {
            for later in &kept[i + 1..] {
                assert!(keeper.confidence >= later.confidence);
                let centers_close = keeper.bbox.center_distance(&later.bbox)
                    < keeper.bbox.max_extent() * config.center_factor;
                assert!(!centers_close);
                assert!(keeper.bbox.iou(&later.bbox) < config.iou_threshold);
            }
        }

        let again = suppress_single_model(kept.clone(), &config);
        assert_eq!(again.len(), kept.len());
    }
}

#[test]
fn test_cross_model_never_crosses_pages() {
    let config = NmsConfig::default();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..30 {
        let input = random_detections(&mut rng, 40);
        let pages_in: std::collections::BTreeSet<usize> = input.iter().map(|d| d.page).collect();

        let kept = suppress_cross_model(input.clone(), &config);
        let pages_out: std::collections::BTreeSet<usize> = kept.iter().map(|d| d.page).collect();
        assert_eq!(pages_in, pages_out);

        // same as running each page alone
        for page in pages_in {
            let alone: Vec<Detection> = input.iter().filter(|d| d.page == page).cloned().collect();
            let expected = suppress_single_model(alone, &config).len();
            assert_eq!(kept.iter().filter(|d| d.page == page).count(), expected);
        }

        assert!(kept.windows(2).all(|w| w[0].page <= w[1].page));
    }
}

#[test]
fn test_cross_model_keeps_each_page_best() {
    let config = NmsConfig::default();
    let mut rng = StdRng::seed_from_u64(13);

    for _ in 0..30 {
        let input = random_detections(&mut rng, 40);
        let kept = suppress_cross_model(input.clone(), &config);

        for page in 0..3 {
            let best = input
                .iter()
                .filter(|d| d.page == page)
                .map(|d| d.confidence)
                .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.max(c))));
            let survivors: Vec<&Detection> = kept.iter().filter(|d| d.page == page).collect();
            match best {
                Some(best) => {
                    assert!(survivors.iter().any(|d| d.confidence == best));
                    assert!(survivors.iter().all(|d| d.confidence <= best));
                }
                None => assert!(survivors.is_empty()),
            }

            for (i, keeper) in survivors.iter().enumerate() {
                for later in &survivors[i + 1..] {
                    let centers_close = keeper.bbox.center_distance(&later.bbox)
                        < keeper.bbox.max_extent() * config.center_factor;
                    assert!(!centers_close);
                    assert!(keeper.bbox.iou(&later.bbox) < config.iou_threshold);
                }
            }
        }
    }
}

#[test]
fn test_text_dedup_is_idempotent() {
    let config = TextDedupConfig::default();
    let mut rng = StdRng::seed_from_u64(99);
    let words = ["FI-101", "TI-101", "PI-2O3", "LT-7", "FI-1O1"];

    for _ in 0..30 {
        let items: Vec<TextItem> = (0..40)
            .map(|i| {
                let bbox = BoundingBox::new(
                    rng.gen_range(0.0..0.2),
                    rng.gen_range(0.0..0.2),
                    rng.gen_range(0.02..0.06),
                    rng.gen_range(0.01..0.03),
                )
                .unwrap();
                let orientation = if i % 2 == 0 {
                    TextOrientation::Horizontal
                } else {
                    TextOrientation::Vertical
                };
                TextItem::new(words[rng.gen_range(0..words.len())], rng.gen_range(0.3..1.0), bbox, orientation)
            })
            .collect();

        let once = dedup_text_items(items.clone(), &config);
        assert!(once.len() <= items.len());
        assert!(!once.is_empty());
        let twice = dedup_text_items(once.clone(), &config);
        assert_eq!(twice, once);
    }
}
