// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Tag extraction properties over randomised detection sets

use image_tagger::{
    tagging::{extract_tags, TagMode, TagSet},
    vision::Detection,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashSet;

const LABELS: &[&str] = &["person", "car", "dog", "cat", "bicycle", "chair"];

fn random_detections(rng: &mut StdRng, count: usize) -> Vec<Detection> {
    (0..count)
        .map(|_| {
            let label = LABELS[rng.gen_range(0..LABELS.len())];
            Detection::labelled(label, rng.gen_range(0.0..1.0))
        })
        .collect()
}

fn survivors(detections: &[Detection], threshold: f32) -> Vec<&str> {
    detections
        .iter()
        .filter(|d| d.score > threshold)
        .map(|d| d.label.as_str())
        .collect()
}

#[test]
fn test_counts_sum_to_survivors() {
    let mut rng = StdRng::seed_from_u64(7);
    for round in 0..50 {
        let detections = random_detections(&mut rng, round);
        let threshold = rng.gen_range(0.0..1.0);

        let TagSet::Counts(counts) = extract_tags(&detections, threshold, TagMode::Counts) else {
            panic!("counts mode must produce a map");
        };
        let total: u32 = counts.values().sum();
        assert_eq!(total as usize, survivors(&detections, threshold).len());
        assert!(counts.values().all(|&c| c > 0));
    }
}

#[test]
fn test_dedup_is_unique_in_first_occurrence_order() {
    let mut rng = StdRng::seed_from_u64(11);
    for round in 0..50 {
        let detections = random_detections(&mut rng, round);
        let threshold = rng.gen_range(0.0..0.9);

        let TagSet::List(labels) = extract_tags(&detections, threshold, TagMode::Dedup) else {
            panic!("dedup mode must produce a list");
        };

        let mut expected = Vec::new();
        for label in survivors(&detections, threshold) {
            if !expected.contains(&label) {
                expected.push(label);
            }
        }
        assert_eq!(labels, expected);
        assert_eq!(labels.iter().collect::<HashSet<_>>().len(), labels.len());
    }
}

#[test]
fn test_raw_keeps_every_survivor() {
    let mut rng = StdRng::seed_from_u64(23);
    let detections = random_detections(&mut rng, 200);

    let TagSet::List(labels) = extract_tags(&detections, 0.5, TagMode::Raw) else {
        panic!("raw mode must produce a list");
    };
    assert_eq!(labels, survivors(&detections, 0.5));
}

#[test]
fn test_score_equal_to_threshold_is_dropped() {
    let detections = vec![
        Detection::labelled("person", 0.7),
        Detection::labelled("person", 0.700_001),
    ];
    assert_eq!(
        extract_tags(&detections, 0.7, TagMode::Raw),
        TagSet::List(vec!["person".to_string()])
    );
}

#[test]
fn test_counts_serialise_as_object() {
    let detections = vec![
        Detection::labelled("dog", 0.9),
        Detection::labelled("cat", 0.9),
        Detection::labelled("dog", 0.8),
    ];
    let json = serde_json::to_value(extract_tags(&detections, 0.7, TagMode::Counts)).unwrap();
    assert_eq!(json, serde_json::json!({"cat": 1, "dog": 2}));
}
