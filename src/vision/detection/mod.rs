// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Object detection for image tagging
//!
//! Two ONNX export styles are understood:
//! - end-to-end `dets`/`labels` exports (mmdeploy RTMDet and similar), NMS
//!   already inside the graph
//! - dense YOLO predictions, NMS applied in [`postprocess`]

pub mod labels;
pub mod model;
pub mod postprocess;
pub mod preprocessing;

pub use labels::{Labels, COCO_CLASSES};
pub use model::DetectionModel;
pub use postprocess::{OutputLayout, RawDetection};

use serde::Serialize;

/// One detected object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub label: String,
    pub score: f32,
    pub class_id: usize,
    /// x1, y1, x2, y2 in original image pixels
    pub bbox: [f32; 4],
}

impl Detection {
    /// A detection without class id or box, as produced by label-only sources
    pub fn labelled(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
            class_id: 0,
            bbox: [0.0; 4],
        }
    }
}
