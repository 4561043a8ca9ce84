// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /process_image: envelope shape, tag modes, captioning and error paths

use super::support::{
    pets, FailingCaptioner, FailingDetector, FixedCaptioner, MultipartBody, TestApp,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_counts_by_default() {
    let app = TestApp::new(Some(Arc::new(pets())), None);

    let (status, body) = app.post("/process_image", MultipartBody::new().image()).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["tags"], json!({"cat": 2, "dog": 1}));
    assert!(body["time_msec"].as_i64().unwrap() > 0);

    let data = body["data"].as_object().unwrap();
    assert!(!data.contains_key("caption"));
    assert!(!data.contains_key("file_name"));
    assert!(body.get("job_id").is_none());

    let req_id = body["req_id"].as_str().unwrap();
    assert!(!req_id.is_empty());
    assert!(req_id.chars().all(|c| c.is_ascii_digit()));

    assert_eq!(app.scratch_files(), 0, "upload must be removed after success");
}

#[tokio::test]
async fn test_all_fields_echoed() {
    let app = TestApp::new(
        Some(Arc::new(pets())),
        Some(Arc::new(FixedCaptioner("two cats and a dog on a couch"))),
    );
    let form = MultipartBody::new()
        .image()
        .text("file_name", "living-room.jpg")
        .text("add_caption", "true")
        .text("remove_duplicates", "true")
        .text("req_id", "req-42")
        .text("job_id", "job-7");

    let (status, body) = app.post("/process_image", form).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["tags"], json!(["cat", "dog"]));
    assert_eq!(body["data"]["caption"], "two cats and a dog on a couch");
    assert_eq!(body["data"]["file_name"], "living-room.jpg");
    assert_eq!(body["req_id"], "req-42");
    assert_eq!(body["job_id"], "job-7");
}

#[tokio::test]
async fn test_threshold_is_exclusive() {
    let app = TestApp::new(Some(Arc::new(pets())), None);
    let form = MultipartBody::new().image().text("threshold", "0.81");

    let (status, body) = app.post("/process_image", form).await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["tags"], json!({"cat": 1}));
}

#[tokio::test]
async fn test_caption_not_requested_is_absent() {
    let app = TestApp::new(
        Some(Arc::new(pets())),
        Some(Arc::new(FixedCaptioner("unused"))),
    );
    let form = MultipartBody::new().image().text("add_caption", "false");

    let (_, body) = app.post("/process_image", form).await;
    assert!(body["data"].get("caption").is_none());
}

#[tokio::test]
async fn test_inference_failure_is_generic_500() {
    let app = TestApp::new(Some(Arc::new(FailingDetector)), None);
    let form = MultipartBody::new().image().text("req_id", "r-1");

    let (status, body) = app.post("/process_image", form).await;

    assert_eq!(status, 500);
    assert_eq!(
        body,
        json!({"status": "error", "message": "processing error !", "req_id": "r-1"})
    );
    assert_eq!(app.scratch_files(), 0, "upload must be removed after failure");
}

#[tokio::test]
async fn test_undecodable_upload_is_processing_error() {
    let app = TestApp::new(Some(Arc::new(pets())), None);
    let form = MultipartBody::new().file("file", "notes.txt", b"definitely not pixels");

    let (status, body) = app.post("/process_image", form).await;

    assert_eq!(status, 500);
    assert_eq!(body["message"], "processing error !");
    assert_eq!(app.scratch_files(), 0);
}

#[tokio::test]
async fn test_caption_without_captioning_model() {
    let app = TestApp::new(Some(Arc::new(pets())), None);
    let form = MultipartBody::new().image().text("add_caption", "1");

    let (status, body) = app.post("/process_image", form).await;
    assert_eq!(status, 500);
    assert_eq!(body["message"], "processing error !");
}

#[tokio::test]
async fn test_missing_file_part() {
    let app = TestApp::new(Some(Arc::new(pets())), None);
    let form = MultipartBody::new().text("req_id", "r-2");

    let (status, body) = app.post("/process_image", form).await;

    assert_eq!(status, 422);
    assert_eq!(body["status"], "error");
    assert_eq!(body["req_id"], "r-2");
    assert!(body["message"].as_str().unwrap().contains("file"));
}

#[tokio::test]
async fn test_malformed_fields() {
    let app = TestApp::new(Some(Arc::new(pets())), None);

    for (field, value) in [
        ("threshold", "high"),
        ("threshold", "1.5"),
        ("add_caption", "perhaps"),
        ("remove_duplicates", "2"),
    ] {
        let form = MultipartBody::new().image().text(field, value);
        let (status, body) = app.post("/process_image", form).await;
        assert_eq!(status, 422, "{}={} should be rejected", field, value);
        assert!(body["message"].as_str().unwrap().contains(field));
    }
    assert_eq!(app.scratch_files(), 0);
}

#[tokio::test]
async fn test_unknown_fields_ignored() {
    let app = TestApp::new(Some(Arc::new(pets())), None);
    let form = MultipartBody::new().image().text("colour", "blue");

    let (status, _) = app.post("/process_image", form).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_caption_failure_removes_upload() {
    let app = TestApp::new(Some(Arc::new(pets())), Some(Arc::new(FailingCaptioner)));
    let form = MultipartBody::new()
        .image()
        .text("add_caption", "true")
        .text("req_id", "r-3");

    let (status, body) = app.post("/process_image", form).await;

    assert_eq!(status, 500);
    assert_eq!(
        body,
        json!({"status": "error", "message": "processing error !", "req_id": "r-3"})
    );
    assert!(!body.to_string().contains("decoder session"));
    assert_eq!(app.scratch_files(), 0, "upload must be removed after failure");
}

#[tokio::test]
async fn test_upload_failure_is_500() {
    let app = TestApp::with_unwritable_scratch(Arc::new(pets()));
    let form = MultipartBody::new().image().text("req_id", "r-4");

    let (status, body) = app.post("/process_image", form).await;

    assert_eq!(status, 500);
    assert_eq!(
        body,
        json!({"status": "error", "message": "error in file upload!", "req_id": "r-4"})
    );
    assert_eq!(app.scratch_files(), 0);
}

#[tokio::test]
async fn test_generated_req_id_on_validation_error() {
    let app = TestApp::new(Some(Arc::new(pets())), None);
    let form = MultipartBody::new().image().text("threshold", "high");

    let (status, body) = app.post("/process_image", form).await;

    assert_eq!(status, 422);
    assert!(!body["req_id"].as_str().unwrap().is_empty());
}
