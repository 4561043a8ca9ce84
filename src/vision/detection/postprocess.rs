// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Decoding of raw detection model outputs

use anyhow::Result;
use ndarray::{ArrayViewD, Axis, Ix3};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Tensor layout of a detection model's outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputLayout {
    /// End-to-end export: `dets [1, N, 5]` (x1, y1, x2, y2, score) and
    /// `labels [1, N]`, NMS already applied
    DetsLabels,
    /// Dense predictions `[1, 4 + classes, anchors]` (cx, cy, w, h, class
    /// scores), NMS applied here
    Yolo,
}

impl OutputLayout {
    /// Guess the layout from a session's output names
    pub fn detect(output_names: &[String]) -> Self {
        let has = |name: &str| output_names.iter().any(|n| n == name);
        if has("dets") && has("labels") {
            OutputLayout::DetsLabels
        } else {
            OutputLayout::Yolo
        }
    }
}

/// A decoded box before class names are attached
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub score: f32,
    /// x1, y1, x2, y2 in model input space
    pub bbox: [f32; 4],
}

/// Decode an end-to-end `dets`/`labels` pair, keeping model order
pub fn decode_dets_labels(
    dets: &ArrayViewD<f32>,
    labels: &[i64],
    min_score: f32,
) -> Result<Vec<RawDetection>> {
    let dets = dets
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| anyhow::anyhow!("Expected dets of shape [1, N, 5], got {:?}", dets.shape()))?;

    let (_, count, width) = dets.dim();
    if width < 5 {
        anyhow::bail!("Expected 5 values per detection, got {}", width);
    }
    if labels.len() < count {
        anyhow::bail!(
            "Detection output has {} boxes but only {} labels",
            count,
            labels.len()
        );
    }

    let mut out = Vec::new();
    for (i, row) in dets.index_axis(Axis(0), 0).outer_iter().enumerate() {
        let score = row[4];
        if score.is_nan() || score < min_score || labels[i] < 0 {
            continue;
        }
        out.push(RawDetection {
            class_id: labels[i] as usize,
            score,
            bbox: [row[0], row[1], row[2], row[3]],
        });
    }
    Ok(out)
}

/// Decode dense YOLO predictions and apply per-class NMS
///
/// Accepts both `[1, 4 + C, A]` and the transposed `[1, A, 4 + C]`; the
/// smaller of the two trailing axes is taken as the channel axis.
pub fn decode_yolo(
    predictions: &ArrayViewD<f32>,
    min_score: f32,
    iou_threshold: f32,
    max_detections: usize,
) -> Result<Vec<RawDetection>> {
    let pred = predictions.view().into_dimensionality::<Ix3>().map_err(|_| {
        anyhow::anyhow!(
            "Expected predictions of shape [1, 4 + classes, anchors], got {:?}",
            predictions.shape()
        )
    })?;

    let pred = pred.index_axis(Axis(0), 0);
    let pred = if pred.nrows() <= pred.ncols() {
        pred
    } else {
        pred.reversed_axes()
    };

    let channels = pred.nrows();
    if channels <= 4 {
        anyhow::bail!("Prediction tensor has no class channels ({} rows)", channels);
    }

    let mut candidates = Vec::new();
    for anchor in pred.columns() {
        let (class_id, score) = anchor
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
            .unwrap_or((0, 0.0));

        if score.is_nan() || score < min_score {
            continue;
        }

        let (cx, cy, w, h) = (anchor[0], anchor[1], anchor[2], anchor[3]);
        candidates.push(RawDetection {
            class_id,
            score,
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
        });
    }

    Ok(nms_per_class(candidates, iou_threshold, max_detections))
}

/// Intersection over union of two xyxy boxes
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix1 = a[0].max(b[0]);
    let iy1 = a[1].max(b[1]);
    let ix2 = a[2].min(b[2]);
    let iy2 = a[3].min(b[3]);

    let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;

    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy NMS within each class; result sorted by descending score
pub fn nms_per_class(
    detections: Vec<RawDetection>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<RawDetection> {
    let mut by_class: BTreeMap<usize, Vec<RawDetection>> = BTreeMap::new();
    for det in detections {
        by_class.entry(det.class_id).or_default().push(det);
    }

    let mut kept = Vec::new();
    for (_, mut group) in by_class {
        group.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        let mut survivors: Vec<RawDetection> = Vec::new();
        for det in group {
            if survivors
                .iter()
                .all(|s| iou(&s.bbox, &det.bbox) <= iou_threshold)
            {
                survivors.push(det);
            }
        }
        kept.extend(survivors);
    }

    kept.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    kept.truncate(max_detections);
    kept
}
