// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

use super::support::{pets, read_json, TestApp};
use axum::{body::Body, http::Request};
use image_tagger::{config::AppConfig, vision::VisionModelManager};
use std::sync::Arc;
use tower::util::ServiceExt;

#[tokio::test]
async fn test_health_reports_models() {
    let app = TestApp::new(Some(Arc::new(pets())), None);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = read_json(app.router.clone().oneshot(request).await.unwrap()).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"]["version"], image_tagger::version::VERSION_NUMBER);

    let models = body["models"].as_array().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0]["kind"], "tagging");
    assert_eq!(models[0]["loaded"], true);
    assert_eq!(models[1]["kind"], "captioning");
    assert_eq!(models[1]["configured"], false);
}

#[tokio::test]
async fn test_health_with_unloaded_config() {
    let config = AppConfig::from_json(r#"{"tagging": {"model": "org/detector"}}"#).unwrap();
    let app = TestApp::with_manager(VisionModelManager::new(Arc::new(config)));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = read_json(app.router.clone().oneshot(request).await.unwrap()).await;

    assert_eq!(status, 200);
    assert_eq!(body["models"][0]["model"], "org/detector");
    assert_eq!(body["models"][0]["configured"], true);
    assert_eq!(body["models"][0]["loaded"], false);
}

#[tokio::test]
async fn test_get_on_upload_route_rejected() {
    let app = TestApp::new(Some(Arc::new(pets())), None);
    let request = Request::builder()
        .uri("/process_image")
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status().as_u16(), 405);
}
