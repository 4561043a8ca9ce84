// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Lazy, once-only model loading through a scripted loader

use async_trait::async_trait;
use image::DynamicImage;
use image_tagger::{
    config::{AppConfig, ModelKind},
    error::{Result, TaggerError},
    vision::{Captioner, Detection, Detector, ModelLoader, VisionModelManager},
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct StubDetector;

impl Detector for StubDetector {
    fn detect(&self, _image: &DynamicImage, _min_score: f32) -> anyhow::Result<Vec<Detection>> {
        Ok(vec![Detection::labelled("person", 0.99)])
    }
}

/// Counts loads; optionally fails the first detector load
#[derive(Default)]
struct ScriptedLoader {
    detector_loads: AtomicUsize,
    captioner_loads: AtomicUsize,
    fail_first_detector: bool,
}

#[async_trait]
impl ModelLoader for ScriptedLoader {
    async fn load_detector(&self, _config: &AppConfig) -> Result<Arc<dyn Detector>> {
        let attempt = self.detector_loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        if self.fail_first_detector && attempt == 0 {
            return Err(TaggerError::model_load(ModelKind::Tagging, "hub unreachable"));
        }
        Ok(Arc::new(StubDetector))
    }

    async fn load_captioner(&self, _config: &AppConfig) -> Result<Arc<dyn Captioner>> {
        self.captioner_loads.fetch_add(1, Ordering::SeqCst);
        Err(TaggerError::model_load(
            ModelKind::Captioning,
            "missing decoder_model.onnx",
        ))
    }
}

fn both_configured() -> Arc<AppConfig> {
    Arc::new(
        AppConfig::from_json(
            r#"{
                "tagging": {"model": "org/detector"},
                "captioning": {"model": "org/florence"}
            }"#,
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn test_concurrent_first_use_loads_once() {
    let loader = Arc::new(ScriptedLoader::default());
    let manager = Arc::new(VisionModelManager::with_loader(
        both_configured(),
        loader.clone(),
    ));

    let tasks = (0..8).map(|_| {
        let manager = manager.clone();
        tokio::spawn(async move { manager.detector().await.map(|_| ()) })
    });
    for result in futures_util::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    assert_eq!(loader.detector_loads.load(Ordering::SeqCst), 1);
    assert!(manager.is_loaded(ModelKind::Tagging));
}

#[tokio::test]
async fn test_failed_load_is_retried() {
    let loader = Arc::new(ScriptedLoader {
        fail_first_detector: true,
        ..ScriptedLoader::default()
    });
    let manager = VisionModelManager::with_loader(both_configured(), loader.clone());

    let err = manager.detector().await.err().unwrap();
    assert!(matches!(
        err,
        TaggerError::ModelLoad {
            kind: ModelKind::Tagging,
            ..
        }
    ));
    assert!(err.to_string().contains("hub unreachable"));
    assert!(!manager.is_loaded(ModelKind::Tagging));

    let detector = manager.detector().await.unwrap();
    let detections = detector.detect(&DynamicImage::new_rgb8(2, 2), 0.5).unwrap();
    assert_eq!(detections[0].label, "person");
    assert_eq!(loader.detector_loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_preload_tolerates_failures() {
    let loader = Arc::new(ScriptedLoader::default());
    let manager = VisionModelManager::with_loader(both_configured(), loader.clone());

    manager.preload().await;

    assert!(manager.is_loaded(ModelKind::Tagging));
    assert!(!manager.is_loaded(ModelKind::Captioning));
    assert_eq!(loader.captioner_loads.load(Ordering::SeqCst), 1);

    // still lazily loadable afterwards
    assert!(manager.captioner().await.is_err());
    assert_eq!(loader.captioner_loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_unconfigured_kind_never_reaches_loader() {
    let loader = Arc::new(ScriptedLoader::default());
    let manager = VisionModelManager::with_loader(Arc::new(AppConfig::default()), loader.clone());

    manager.preload().await;
    let err = manager.captioner().await.err().unwrap();

    assert!(matches!(err, TaggerError::NotConfigured(ModelKind::Captioning)));
    assert_eq!(loader.detector_loads.load(Ordering::SeqCst), 0);
    assert_eq!(loader.captioner_loads.load(Ordering::SeqCst), 0);
}
