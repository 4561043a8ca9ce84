// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /tag_image: raw label lists, no captions, 404 without a detector

use super::support::{pets, FailingDetector, FixedCaptioner, MultipartBody, TestApp};
use image_tagger::{config::AppConfig, vision::VisionModelManager};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_raw_labels() {
    let app = TestApp::new(Some(Arc::new(pets())), None);

    let (status, body) = app.post("/tag_image", MultipartBody::new().image()).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["tags"], json!(["cat", "dog", "cat"]));
    assert!(body["req_id"].is_string());
    assert_eq!(app.scratch_files(), 0);
}

#[tokio::test]
async fn test_remove_duplicates() {
    let app = TestApp::new(Some(Arc::new(pets())), None);
    let form = MultipartBody::new()
        .image()
        .text("remove_duplicates", "yes")
        .text("job_id", "job-3");

    let (status, body) = app.post("/tag_image", form).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["tags"], json!(["cat", "dog"]));
    assert_eq!(body["job_id"], "job-3");
}

#[tokio::test]
async fn test_never_captions() {
    let app = TestApp::new(
        Some(Arc::new(pets())),
        Some(Arc::new(FixedCaptioner("should not appear"))),
    );
    let form = MultipartBody::new()
        .image()
        .text("add_caption", "true")
        .text("file_name", "ignored.png");

    let (status, body) = app.post("/tag_image", form).await;

    assert_eq!(status, 200);
    let data = body["data"].as_object().unwrap();
    assert!(!data.contains_key("caption"));
    assert!(!data.contains_key("file_name"));
}

#[tokio::test]
async fn test_not_configured_is_404() {
    let manager = VisionModelManager::new(Arc::new(AppConfig::default()));
    let app = TestApp::with_manager(manager);

    let (status, body) = app.post("/tag_image", MultipartBody::new().image()).await;

    assert_eq!(status, 404);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("tagging"));
    assert_eq!(app.scratch_files(), 0);
}

#[tokio::test]
async fn test_inference_failure() {
    let app = TestApp::new(Some(Arc::new(FailingDetector)), None);

    let (status, body) = app.post("/tag_image", MultipartBody::new().image()).await;

    assert_eq!(status, 500);
    assert_eq!(body["message"], "processing error !");
    assert!(!body.to_string().contains("out of memory"));
}

#[tokio::test]
async fn test_high_threshold_yields_empty_list() {
    let app = TestApp::new(Some(Arc::new(pets())), None);
    let form = MultipartBody::new().image().text("threshold", "0.95");

    let (status, body) = app.post("/tag_image", form).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["tags"], json!([]));
}

#[tokio::test]
async fn test_req_id_echoed() {
    let app = TestApp::new(Some(Arc::new(pets())), None);

    let form = MultipartBody::new().image().text("req_id", "tag-9");
    let (status, body) = app.post("/tag_image", form).await;
    assert_eq!(status, 200);
    assert_eq!(body["req_id"], "tag-9");

    let form = MultipartBody::new()
        .image()
        .text("req_id", "tag-10")
        .text("threshold", "-1");
    let (status, body) = app.post("/tag_image", form).await;
    assert_eq!(status, 422);
    assert_eq!(body["req_id"], "tag-10");
}
