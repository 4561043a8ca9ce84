// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Artifact resolution against a models cache on disk

use image_tagger::{
    config::{AppConfig, ModelKind},
    models::{
        resolve_captioning, resolve_detection, ModelStateStore, ResolvedModel, StateStores,
        STATE_FILE_NAME,
    },
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn touch(path: &Path) -> PathBuf {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, b"onnx").unwrap();
    path.to_path_buf()
}

fn config_in(dir: &TempDir, json: serde_json::Value) -> AppConfig {
    let path = dir.path().join("config.json");
    std::fs::write(&path, json.to_string()).unwrap();
    AppConfig::load(&path).unwrap()
}

#[tokio::test]
async fn test_state_file_reused_across_stores() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("models");
    let weights = touch(&cache.join("hub/detector/model.onnx"));

    let mut artifacts = BTreeMap::new();
    artifacts.insert("weights".to_string(), weights.clone());
    ModelStateStore::new(&cache)
        .put(
            ModelKind::Tagging,
            ResolvedModel::new("org/detector", artifacts)
                .with_variant(Some("model.onnx".to_string())),
        )
        .await
        .unwrap();
    assert!(cache.join(STATE_FILE_NAME).is_file());

    let config = config_in(
        &dir,
        serde_json::json!({
            "models_cache": cache,
            "tagging": {"model": "org/detector"},
        }),
    );
    let store = StateStores::default().store_for(&config.cache_dir(ModelKind::Tagging));
    let resolved = resolve_detection(config.tagging().unwrap(), &store)
        .await
        .unwrap();

    assert_eq!(resolved.weights, weights);
}

#[tokio::test]
async fn test_records_for_both_kinds_coexist() {
    let dir = TempDir::new().unwrap();
    let stores = StateStores::default();

    let mut detection = BTreeMap::new();
    detection.insert("weights".to_string(), touch(&dir.path().join("det.onnx")));
    let mut caption = BTreeMap::new();
    for (role, file) in [
        ("vision_encoder", "onnx/vision_encoder.onnx"),
        ("embed_tokens", "onnx/embed_tokens.onnx"),
        ("encoder", "onnx/encoder_model.onnx"),
        ("decoder", "onnx/decoder_model.onnx"),
        ("tokenizer", "tokenizer.json"),
    ] {
        caption.insert(role.to_string(), touch(&dir.path().join("florence").join(file)));
    }

    let caption_record =
        ResolvedModel::new("org/florence", caption).with_variant(Some("onnx".to_string()));
    let (tagging_store, captioning_store) =
        (stores.store_for(dir.path()), stores.store_for(dir.path()));
    let (a, b) = tokio::join!(
        tagging_store.put(ModelKind::Tagging, ResolvedModel::new("org/detector", detection)),
        captioning_store.put(ModelKind::Captioning, caption_record),
    );
    a.unwrap();
    b.unwrap();

    let reopened = ModelStateStore::new(dir.path());
    assert!(reopened.get(ModelKind::Tagging).await.is_some());
    let record = reopened.get(ModelKind::Captioning).await.unwrap();
    assert_eq!(record.model, "org/florence");

    let config = AppConfig::from_json(r#"{"captioning": {"model": "org/florence"}}"#).unwrap();
    let artifacts = resolve_captioning(config.captioning().unwrap(), &reopened)
        .await
        .unwrap();
    assert!(artifacts.decoder.ends_with("decoder_model.onnx"));
}

#[tokio::test]
async fn test_corrupt_state_file_is_ignored() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(STATE_FILE_NAME), b"{ not json").unwrap();

    let store = ModelStateStore::new(dir.path());
    assert!(store.get(ModelKind::Tagging).await.is_none());

    let mut artifacts = BTreeMap::new();
    artifacts.insert("weights".to_string(), touch(&dir.path().join("w.onnx")));
    store
        .put(ModelKind::Tagging, ResolvedModel::new("org/detector", artifacts))
        .await
        .unwrap();
    assert!(store.get(ModelKind::Tagging).await.is_some());
}

#[tokio::test]
async fn test_local_directory_beats_state_record() {
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("my-detector");
    let local_weights = touch(&local.join("end2end.onnx"));

    let mut artifacts = BTreeMap::new();
    artifacts.insert("weights".to_string(), touch(&dir.path().join("other.onnx")));
    ModelStateStore::new(dir.path())
        .put(
            ModelKind::Tagging,
            ResolvedModel::new(local.to_string_lossy(), artifacts),
        )
        .await
        .unwrap();

    let config = AppConfig::from_json(
        &serde_json::json!({"tagging": {"model": local}}).to_string(),
    )
    .unwrap();
    let resolved = resolve_detection(config.tagging().unwrap(), &ModelStateStore::new(dir.path()))
        .await
        .unwrap();
    assert_eq!(resolved.weights, local_weights);
}

#[tokio::test]
async fn test_record_from_previous_revision_is_not_reused() {
    let dir = TempDir::new().unwrap();
    let old_weights = touch(&dir.path().join("hub/v1/model.onnx"));
    let store = ModelStateStore::new(dir.path());

    let mut artifacts = BTreeMap::new();
    artifacts.insert("weights".to_string(), old_weights.clone());
    store
        .put(
            ModelKind::Tagging,
            ResolvedModel::new("org/detector", artifacts)
                .with_revision(Some("v1".to_string()))
                .with_variant(Some("model.onnx".to_string())),
        )
        .await
        .unwrap();

    let current = AppConfig::from_json(
        r#"{"tagging": {"model": "org/detector", "revision": "v1"}}"#,
    )
    .unwrap();
    let resolved = resolve_detection(current.tagging().unwrap(), &store)
        .await
        .unwrap();
    assert_eq!(resolved.weights, old_weights);

    let moved = AppConfig::from_json(
        r#"{"tagging": {"model": "org/detector", "revision": "v2"}}"#,
    )
    .unwrap();
    let resolved = resolve_detection(moved.tagging().unwrap(), &store).await;
    assert!(resolved.map(|a| a.weights != old_weights).unwrap_or(true));
}
