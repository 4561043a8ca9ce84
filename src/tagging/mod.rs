// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tag extraction from detection results
//!
//! A detection becomes a tag only when its score is strictly greater than the
//! threshold. Surviving labels are then counted, deduplicated, or returned
//! as-is depending on [`TagMode`].

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::vision::Detection;

/// Default confidence threshold
pub const DEFAULT_THRESHOLD: f32 = 0.7;

/// How surviving labels are aggregated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMode {
    /// label -> number of detections
    #[default]
    Counts,
    /// Unique labels, first-occurrence order
    Dedup,
    /// Every label, detection order
    Raw,
}

/// Aggregated tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TagSet {
    Counts(BTreeMap<String, u32>),
    List(Vec<String>),
}

impl TagSet {
    pub fn len(&self) -> usize {
        match self {
            TagSet::Counts(counts) => counts.len(),
            TagSet::List(labels) => labels.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Filter `detections` by `threshold` (exclusive) and aggregate per `mode`
pub fn extract_tags(detections: &[Detection], threshold: f32, mode: TagMode) -> TagSet {
    let surviving = detections
        .iter()
        .filter(|d| d.score > threshold)
        .map(|d| d.label.as_str());

    match mode {
        TagMode::Counts => {
            let mut counts = BTreeMap::new();
            for label in surviving {
                *counts.entry(label.to_string()).or_insert(0) += 1;
            }
            TagSet::Counts(counts)
        }
        TagMode::Dedup => {
            let mut seen = HashSet::new();
            TagSet::List(
                surviving
                    .filter(|label| seen.insert(*label))
                    .map(str::to_string)
                    .collect(),
            )
        }
        TagMode::Raw => TagSet::List(surviving.map(str::to_string).collect()),
    }
}
