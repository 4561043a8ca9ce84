// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX object-detection model

use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::Array4;
use ort::session::SessionOutputs;
use ort::value::Value;
use std::time::Instant;
use tracing::{debug, info};

use super::labels::Labels;
use super::postprocess::{decode_dets_labels, decode_yolo, OutputLayout, RawDetection};
use super::preprocessing::{preprocess, Letterbox, Normalization};
use super::Detection;
use crate::config::TaggingConfig;
use crate::models::DetectionArtifacts;
use crate::vision::session::{self, SharedSession};
use crate::vision::Detector;

/// Object-detection model backed by an ONNX Runtime session
pub struct DetectionModel {
    session: SharedSession,
    input_name: String,
    layout: OutputLayout,
    normalization: Normalization,
    labels: Labels,
    input_size: u32,
    iou_threshold: f32,
    max_detections: usize,
}

impl std::fmt::Debug for DetectionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionModel")
            .field("input_name", &self.input_name)
            .field("layout", &self.layout)
            .field("input_size", &self.input_size)
            .field("classes", &self.labels.len())
            .finish_non_exhaustive()
    }
}

impl DetectionModel {
    /// Build the session and class table for resolved `artifacts`
    ///
    /// Blocking: call from `spawn_blocking` inside async code.
    pub fn load(config: &TaggingConfig, artifacts: &DetectionArtifacts) -> Result<Self> {
        info!(
            "Loading detection model from {}",
            artifacts.weights.display()
        );

        let labels = match artifacts.labels {
            Some(ref path) => Labels::from_file(path)?,
            None => Labels::coco(),
        };

        let session = session::build_session(&artifacts.weights, config.device)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "input".to_string());
        let output_names = session::output_names(&session);

        let layout = config
            .layout
            .unwrap_or_else(|| OutputLayout::detect(&output_names));
        let normalization = match layout {
            OutputLayout::DetsLabels => Normalization::RTMDET,
            OutputLayout::Yolo => Normalization::YOLO,
        };

        debug!(
            "Detection model - input: {}, outputs: {:?}, layout: {:?}",
            input_name, output_names, layout
        );
        info!(
            "✅ Detection model loaded ({:?} layout, {} classes)",
            layout,
            labels.len()
        );

        Ok(Self {
            session: session::shared(session),
            input_name,
            layout,
            normalization,
            labels,
            input_size: config.input_size,
            iou_threshold: config.iou_threshold,
            max_detections: config.max_detections,
        })
    }

    pub fn layout(&self) -> OutputLayout {
        self.layout
    }

    fn run(&self, tensor: Array4<f32>, min_score: f32) -> Result<Vec<RawDetection>> {
        let input_value = Value::from_array(tensor).context("Failed to create input tensor")?;

        let mut session = session::lock(&self.session)?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Detection inference failed")?;

        match self.layout {
            OutputLayout::DetsLabels => Self::decode_end_to_end(&outputs, min_score),
            OutputLayout::Yolo => {
                let predictions = outputs[0]
                    .try_extract_array::<f32>()
                    .context("Failed to extract prediction tensor")?;
                debug!("Prediction shape: {:?}", predictions.shape());
                decode_yolo(
                    &predictions,
                    min_score,
                    self.iou_threshold,
                    self.max_detections,
                )
            }
        }
    }

    fn decode_end_to_end(outputs: &SessionOutputs, min_score: f32) -> Result<Vec<RawDetection>> {
        let dets = outputs["dets"]
            .try_extract_array::<f32>()
            .context("Failed to extract dets tensor")?;
        debug!("dets shape: {:?}", dets.shape());

        let labels: Vec<i64> = match outputs["labels"].try_extract_array::<i64>() {
            Ok(view) => view.iter().copied().collect(),
            Err(_) => outputs["labels"]
                .try_extract_array::<i32>()
                .context("Failed to extract labels tensor")?
                .iter()
                .map(|&l| l as i64)
                .collect(),
        };

        decode_dets_labels(&dets, &labels, min_score)
    }

    fn name_detections(&self, raw: Vec<RawDetection>, letterbox: &Letterbox) -> Vec<Detection> {
        raw.into_iter()
            .map(|det| {
                let (x1, y1) = letterbox.map_to_original(det.bbox[0], det.bbox[1]);
                let (x2, y2) = letterbox.map_to_original(det.bbox[2], det.bbox[3]);
                Detection {
                    label: self.labels.name(det.class_id),
                    score: det.score,
                    class_id: det.class_id,
                    bbox: [x1, y1, x2, y2],
                }
            })
            .collect()
    }
}

impl Detector for DetectionModel {
    fn detect(&self, image: &DynamicImage, min_score: f32) -> Result<Vec<Detection>> {
        let start = Instant::now();

        let (tensor, letterbox) = preprocess(image, self.input_size, &self.normalization);
        let raw = self.run(tensor, min_score)?;
        let detections = self.name_detections(raw, &letterbox);

        debug!(
            "Detected {} objects in {} ms",
            detections.len(),
            start.elapsed().as_millis()
        );
        Ok(detections)
    }
}
