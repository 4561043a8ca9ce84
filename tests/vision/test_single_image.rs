// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Single-image tagging as used by the command line

use image::{DynamicImage, ImageFormat};
use image_tagger::{
    cli::tag_file,
    config::AppConfig,
    pipeline::TagRequest,
    tagging::TagMode,
    vision::{Captioner, Detection, Detector, VisionModelManager},
};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

struct Street;

impl Detector for Street {
    fn detect(&self, _image: &DynamicImage, _min_score: f32) -> anyhow::Result<Vec<Detection>> {
        Ok(vec![
            Detection::labelled("car", 0.88),
            Detection::labelled("person", 0.91),
            Detection::labelled("car", 0.72),
            Detection::labelled("traffic light", 0.30),
        ])
    }
}

struct Caption;

impl Captioner for Caption {
    fn caption(&self, _image: &DynamicImage) -> anyhow::Result<String> {
        Ok("a busy street with cars".to_string())
    }
}

fn street_image(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("street.jpg");
    DynamicImage::new_rgb8(32, 24)
        .save_with_format(&path, ImageFormat::Jpeg)
        .unwrap();
    path
}

fn manager() -> VisionModelManager {
    VisionModelManager::with_models(
        Arc::new(AppConfig::default()),
        Some(Arc::new(Street)),
        Some(Arc::new(Caption)),
    )
}

#[tokio::test]
async fn test_envelope_uses_base_name() {
    let dir = TempDir::new().unwrap();
    let path = street_image(&dir);

    let envelope = tag_file(&manager(), &path, TagRequest::default())
        .await
        .unwrap();
    let json = serde_json::to_value(&envelope).unwrap();

    assert_eq!(json["data"]["tags"], json!({"car": 2, "person": 1}));
    assert_eq!(json["data"]["file_name"], "street.jpg");
    assert!(json["data"].get("caption").is_none());
    assert!(json.get("req_id").is_none());
}

#[tokio::test]
async fn test_caption_and_dedup() {
    let dir = TempDir::new().unwrap();
    let path = street_image(&dir);
    let request = TagRequest {
        mode: TagMode::Dedup,
        add_caption: true,
        ..TagRequest::default()
    };

    let envelope = tag_file(&manager(), &path, request).await.unwrap();

    let json = serde_json::to_value(&envelope).unwrap();
    assert_eq!(json["data"]["tags"], json!(["car", "person"]));
    assert_eq!(json["data"]["caption"], "a busy street with cars");
}

#[tokio::test]
async fn test_missing_image_fails() {
    let dir = TempDir::new().unwrap();
    let result = tag_file(
        &manager(),
        &dir.path().join("nope.png"),
        TagRequest::default(),
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
#[ignore] // Requires IMAGE_TAGGER_TEST_CONFIG pointing at a config with real models
async fn test_real_models_tag_an_image() {
    let config_path = std::env::var("IMAGE_TAGGER_TEST_CONFIG").unwrap();
    let image_path = std::env::var("IMAGE_TAGGER_TEST_IMAGE").unwrap();
    let config = AppConfig::load(&config_path).unwrap();
    let manager = VisionModelManager::new(Arc::new(config));

    let request = TagRequest {
        threshold: 0.3,
        add_caption: true,
        ..TagRequest::default()
    };
    let envelope = tag_file(&manager, std::path::Path::new(&image_path), request)
        .await
        .unwrap();

    println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
    assert!(!envelope.data.tags.is_empty());
    assert!(envelope.data.caption.is_some());
}
