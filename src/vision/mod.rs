// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision models for image tagging and captioning
//!
//! This module provides:
//! - Object detection ([`detection`]) producing labelled, scored boxes
//! - Image captioning via Florence-2 ([`captioning`])
//! - The [`VisionModelManager`] application context that loads each model once

pub mod captioning;
pub mod detection;
pub mod image_utils;
pub mod model_manager;
pub mod session;

pub use detection::Detection;
pub use image_utils::{decode_image_bytes, load_image, ImageError, ImageInfo};
pub use model_manager::{ModelLoader, ModelStatus, OnnxModelLoader, VisionModelManager};

use image::DynamicImage;

/// Runs an object-detection model over one image
#[cfg_attr(test, mockall::automock)]
pub trait Detector: Send + Sync {
    /// Detections with `score >= min_score`, in model output order
    fn detect(&self, image: &DynamicImage, min_score: f32) -> anyhow::Result<Vec<Detection>>;
}

/// Produces a natural-language caption for one image
#[cfg_attr(test, mockall::automock)]
pub trait Captioner: Send + Sync {
    fn caption(&self, image: &DynamicImage) -> anyhow::Result<String>;
}
