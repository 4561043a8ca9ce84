// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared processing pipeline used by the HTTP handlers and the CLI
//!
//! Detection runs first; captioning follows only when requested. Both run on
//! the blocking pool over a single decoded copy of the image.

use image::DynamicImage;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{Result, TaggerError};
use crate::tagging::{extract_tags, TagMode, TagSet, DEFAULT_THRESHOLD};
use crate::vision::{load_image, Captioner, Detector, VisionModelManager};

/// What to compute for one image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagRequest {
    pub threshold: f32,
    pub mode: TagMode,
    pub add_caption: bool,
}

impl Default for TagRequest {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            mode: TagMode::Counts,
            add_caption: false,
        }
    }
}

/// Tags and optional caption for one image
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    pub tags: TagSet,
    pub caption: Option<String>,
}

/// Tag (and optionally caption) the image at `path`
///
/// The captioning model is only fetched once detection has succeeded.
pub async fn process_image(
    manager: &VisionModelManager,
    path: &Path,
    request: TagRequest,
) -> Result<ProcessedImage> {
    let start = Instant::now();

    let detector = manager.detector().await?;
    let path = path.to_path_buf();
    let (image, tags) = blocking(move || run_detection(&path, &*detector, request)).await?;

    let caption = if request.add_caption {
        let captioner = manager.captioner().await?;
        blocking(move || run_captioning(&image, &*captioner)).await?
    } else {
        None
    };

    let processed = ProcessedImage { tags, caption };
    info!(
        "Processed image: {} tags, caption: {}, {} ms",
        processed.tags.len(),
        processed.caption.is_some(),
        start.elapsed().as_millis()
    );
    Ok(processed)
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TaggerError::Inference(anyhow::anyhow!("Inference task failed: {}", e)))?
}

fn run_detection(
    path: &Path,
    detector: &dyn Detector,
    request: TagRequest,
) -> Result<(DynamicImage, TagSet)> {
    let (image, info) = load_image(path).map_err(|e| TaggerError::Inference(e.into()))?;
    debug!("Loaded {}x{} {:?} image", info.width, info.height, info.format);

    let detections = detector
        .detect(&image, request.threshold)
        .map_err(|e| TaggerError::Inference(e.context("Detection failed")))?;
    let tags = extract_tags(&detections, request.threshold, request.mode);
    Ok((image, tags))
}

fn run_captioning(image: &DynamicImage, captioner: &dyn Captioner) -> Result<Option<String>> {
    let caption = captioner
        .caption(image)
        .map_err(|e| TaggerError::Inference(e.context("Captioning failed")))?;
    Ok(Some(caption).filter(|c| !c.is_empty()))
}
