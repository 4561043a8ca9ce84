// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision model manager for loading and sharing the tagging and captioning models

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::config::{AppConfig, ModelKind};
use crate::error::{Result, TaggerError};
use crate::models::{resolve_captioning, resolve_detection, StateStores};
use crate::vision::captioning::CaptionModel;
use crate::vision::detection::DetectionModel;
use crate::vision::{Captioner, Detector};

/// Resolves and instantiates models from configuration
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load_detector(&self, config: &AppConfig) -> Result<Arc<dyn Detector>>;
    async fn load_captioner(&self, config: &AppConfig) -> Result<Arc<dyn Captioner>>;
}

/// Loads ONNX models, downloading artifacts into the models cache when needed
#[derive(Debug, Default, Clone)]
pub struct OnnxModelLoader {
    stores: StateStores,
}

#[async_trait]
impl ModelLoader for OnnxModelLoader {
    async fn load_detector(&self, config: &AppConfig) -> Result<Arc<dyn Detector>> {
        let kind = ModelKind::Tagging;
        let tagging = config.tagging()?.clone();
        let store = self.stores.store_for(&config.cache_dir(kind));

        let artifacts = resolve_detection(&tagging, &store)
            .await
            .map_err(|e| TaggerError::model_load(kind, format!("{:#}", e)))?;

        let model = tokio::task::spawn_blocking(move || DetectionModel::load(&tagging, &artifacts))
            .await
            .map_err(|e| TaggerError::model_load(kind, e))?
            .map_err(|e| TaggerError::model_load(kind, format!("{:#}", e)))?;

        Ok(Arc::new(model))
    }

    async fn load_captioner(&self, config: &AppConfig) -> Result<Arc<dyn Captioner>> {
        let kind = ModelKind::Captioning;
        let captioning = config.captioning()?.clone();
        let store = self.stores.store_for(&config.cache_dir(kind));

        let artifacts = resolve_captioning(&captioning, &store)
            .await
            .map_err(|e| TaggerError::model_load(kind, format!("{:#}", e)))?;

        let model =
            tokio::task::spawn_blocking(move || CaptionModel::load(&captioning, &artifacts))
                .await
                .map_err(|e| TaggerError::model_load(kind, e))?
                .map_err(|e| TaggerError::model_load(kind, format!("{:#}", e)))?;

        Ok(Arc::new(model))
    }
}

/// Status of one model kind, as reported by `/health`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub kind: ModelKind,
    /// Configured model identifier
    pub model: Option<String>,
    pub configured: bool,
    pub loaded: bool,
}

/// Application context owning one lazily loaded handle per model kind
///
/// Each handle is initialised at most once; concurrent first callers share
/// the same load. A failed load leaves the handle empty so the next call
/// retries.
pub struct VisionModelManager {
    config: Arc<AppConfig>,
    loader: Arc<dyn ModelLoader>,
    detector: OnceCell<Arc<dyn Detector>>,
    captioner: OnceCell<Arc<dyn Captioner>>,
}

impl std::fmt::Debug for VisionModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionModelManager")
            .field("detector_loaded", &self.detector.initialized())
            .field("captioner_loaded", &self.captioner.initialized())
            .finish_non_exhaustive()
    }
}

impl VisionModelManager {
    pub fn new(config: Arc<AppConfig>) -> Self {
        Self::with_loader(config, Arc::new(OnnxModelLoader::default()))
    }

    pub fn with_loader(config: Arc<AppConfig>, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            config,
            loader,
            detector: OnceCell::new(),
            captioner: OnceCell::new(),
        }
    }

    /// Manager with already-built models; kinds left `None` load through `loader`
    pub fn with_models(
        config: Arc<AppConfig>,
        detector: Option<Arc<dyn Detector>>,
        captioner: Option<Arc<dyn Captioner>>,
    ) -> Self {
        Self {
            config,
            loader: Arc::new(OnnxModelLoader::default()),
            detector: OnceCell::new_with(detector),
            captioner: OnceCell::new_with(captioner),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn is_configured(&self, kind: ModelKind) -> bool {
        self.is_loaded(kind) || self.config.is_configured(kind)
    }

    pub fn is_loaded(&self, kind: ModelKind) -> bool {
        match kind {
            ModelKind::Tagging => self.detector.initialized(),
            ModelKind::Captioning => self.captioner.initialized(),
        }
    }

    /// The detection model, loading it on first use
    pub async fn detector(&self) -> Result<Arc<dyn Detector>> {
        if let Some(detector) = self.detector.get() {
            return Ok(detector.clone());
        }
        if !self.config.is_configured(ModelKind::Tagging) {
            return Err(TaggerError::NotConfigured(ModelKind::Tagging));
        }

        self.detector
            .get_or_try_init(|| async {
                let detector = self.loader.load_detector(&self.config).await?;
                info!("✅ Tagging model ready");
                Ok::<_, TaggerError>(detector)
            })
            .await
            .cloned()
    }

    /// The captioning model, loading it on first use
    pub async fn captioner(&self) -> Result<Arc<dyn Captioner>> {
        if let Some(captioner) = self.captioner.get() {
            return Ok(captioner.clone());
        }
        if !self.config.is_configured(ModelKind::Captioning) {
            return Err(TaggerError::NotConfigured(ModelKind::Captioning));
        }

        self.captioner
            .get_or_try_init(|| async {
                let captioner = self.loader.load_captioner(&self.config).await?;
                info!("✅ Captioning model ready");
                Ok::<_, TaggerError>(captioner)
            })
            .await
            .cloned()
    }

    /// Eagerly load every configured model, both kinds concurrently
    ///
    /// Failures are logged; the kind stays lazily loadable.
    pub async fn preload(&self) {
        let loads = ModelKind::ALL.into_iter().map(|kind| async move {
            if !self.config.is_configured(kind) {
                info!("No {} model configured, skipping preload", kind);
                return;
            }
            let result = match kind {
                ModelKind::Tagging => self.detector().await.map(|_| ()),
                ModelKind::Captioning => self.captioner().await.map(|_| ()),
            };
            if let Err(e) = result {
                warn!("⚠️ Failed to preload {} model: {}", kind, e);
            }
        });
        futures::future::join_all(loads).await;
    }

    /// Per-kind configuration and load status
    pub fn list_models(&self) -> Vec<ModelStatus> {
        ModelKind::ALL
            .into_iter()
            .map(|kind| {
                let model = match kind {
                    ModelKind::Tagging => self.config.tagging.as_ref().map(|c| c.model.clone()),
                    ModelKind::Captioning => {
                        self.config.captioning.as_ref().map(|c| c.model.clone())
                    }
                };
                ModelStatus {
                    kind,
                    model,
                    configured: self.is_configured(kind),
                    loaded: self.is_loaded(kind),
                }
            })
            .collect()
    }
}
