// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model artifact resolution
//!
//! Turns a configured model identifier into local files: an explicit path in
//! the configuration, a local file or directory, a still-valid record in the
//! state file, or finally a Hugging Face Hub download into the models cache.

pub mod downloading;
pub mod state;

pub use downloading::{DownloadError, HubFile, ModelDownloader};
pub use state::{ModelStateStore, ResolvedModel, SourceKey, StateStores, STATE_FILE_NAME};

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{CaptioningConfig, ModelKind, TaggingConfig};

/// Alternative weight file names tried inside a local detection model directory
const DETECTION_WEIGHT_NAMES: &[&str] = &["model.onnx", "end2end.onnx"];

/// Files making up an ONNX detection model
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionArtifacts {
    pub weights: PathBuf,
    pub labels: Option<PathBuf>,
}

impl DetectionArtifacts {
    const WEIGHTS: &'static str = "weights";
}

/// Files making up an ONNX Florence-2 captioning model
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionArtifacts {
    pub vision_encoder: PathBuf,
    pub embed_tokens: PathBuf,
    pub encoder: PathBuf,
    pub decoder: PathBuf,
    pub tokenizer: PathBuf,
}

impl CaptionArtifacts {
    const ROLES: [(&'static str, &'static str); 5] = [
        ("vision_encoder", "vision_encoder.onnx"),
        ("embed_tokens", "embed_tokens.onnx"),
        ("encoder", "encoder_model.onnx"),
        ("decoder", "decoder_model.onnx"),
        ("tokenizer", "tokenizer.json"),
    ];

    fn role_names() -> Vec<&'static str> {
        Self::ROLES.iter().map(|(role, _)| *role).collect()
    }

    fn from_map(map: &BTreeMap<String, PathBuf>) -> Option<Self> {
        let get = |role: &str| map.get(role).cloned();
        Some(Self {
            vision_encoder: get("vision_encoder")?,
            embed_tokens: get("embed_tokens")?,
            encoder: get("encoder")?,
            decoder: get("decoder")?,
            tokenizer: get("tokenizer")?,
        })
    }

    fn to_map(&self) -> BTreeMap<String, PathBuf> {
        [
            ("vision_encoder", &self.vision_encoder),
            ("embed_tokens", &self.embed_tokens),
            ("encoder", &self.encoder),
            ("decoder", &self.decoder),
            ("tokenizer", &self.tokenizer),
        ]
        .into_iter()
        .map(|(role, path)| (role.to_string(), path.clone()))
        .collect()
    }

    /// Locate every artifact under `dir`, also looking in `dir/<subfolder>`
    fn find_in(dir: &Path, subfolder: &str) -> Result<Self> {
        let search = [dir.join(subfolder), dir.to_path_buf()];
        let mut map = BTreeMap::new();
        for (role, file) in Self::ROLES {
            let path = search
                .iter()
                .map(|d| d.join(file))
                .find(|p| p.is_file())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "Captioning artifact {} not found in {}",
                        file,
                        dir.display()
                    )
                })?;
            map.insert(role.to_string(), path);
        }
        Self::from_map(&map).context("Incomplete captioning artifacts")
    }
}

/// `model` as given when it exists on disk, else the same name under `cache_dir`
fn local_model_path(model: &str, cache_dir: &Path) -> PathBuf {
    let direct = PathBuf::from(model);
    if direct.exists() {
        return direct;
    }
    let cached = cache_dir.join(model);
    if cached.exists() {
        return cached;
    }
    direct
}

/// Find the first existing file among `names` inside `dir`
pub fn find_model_file(dir: &Path, names: &[&str]) -> Result<PathBuf> {
    for name in names {
        let path = dir.join(name);
        if path.is_file() {
            return Ok(path);
        }
    }
    anyhow::bail!(
        "No model file found in {}. Tried: {:?}",
        dir.display(),
        names
    )
}

fn detection_source(config: &TaggingConfig) -> SourceKey<'_> {
    SourceKey {
        model: &config.model,
        revision: config.revision.as_deref(),
        variant: Some(&config.weights_file),
    }
}

fn captioning_source(config: &CaptioningConfig) -> SourceKey<'_> {
    SourceKey {
        model: &config.model,
        revision: config.revision.as_deref(),
        variant: Some(&config.onnx_subfolder),
    }
}

/// Resolve detection weights for `config`, downloading into the store's models cache when needed
pub async fn resolve_detection(
    config: &TaggingConfig,
    store: &ModelStateStore,
) -> Result<DetectionArtifacts> {
    let cache_dir = store.models_cache();
    let labels = config.labels.clone();

    if let Some(ref weights) = config.weights {
        if weights.is_file() {
            debug!("Using configured weights {}", weights.display());
            return Ok(DetectionArtifacts {
                weights: weights.clone(),
                labels,
            });
        }
        warn!(
            "Configured weights {} do not exist, resolving '{}' instead",
            weights.display(),
            config.model
        );
    }

    let local = local_model_path(&config.model, cache_dir);
    let local = local.as_path();
    if local.is_file() {
        debug!("Using local weights file {}", local.display());
        return Ok(DetectionArtifacts {
            weights: local.to_path_buf(),
            labels,
        });
    }
    if local.is_dir() {
        let mut names = vec![config.weights_file.as_str()];
        names.extend(DETECTION_WEIGHT_NAMES);
        let weights = find_model_file(local, &names)?;
        debug!("Using weights {} from local directory", weights.display());
        return Ok(DetectionArtifacts { weights, labels });
    }

    let source = detection_source(config);
    if let Some(record) = store.get(ModelKind::Tagging).await {
        if record.is_usable(&source, &[DetectionArtifacts::WEIGHTS]) {
            if let Some(weights) = record.artifact(DetectionArtifacts::WEIGHTS) {
                info!("Using previously resolved weights {}", weights.display());
                return Ok(DetectionArtifacts {
                    weights: weights.to_path_buf(),
                    labels,
                });
            }
        }
        debug!("State record for tagging is stale, resolving again");
    }

    info!(
        "Downloading detection model {} ({}) into {}",
        config.model,
        config.weights_file,
        cache_dir.display()
    );
    let downloader = ModelDownloader::new(cache_dir).await?;
    let weights = downloader
        .fetch(
            &HubFile::new(config.model.as_str(), config.weights_file.as_str())
                .with_revision(config.revision.clone()),
        )
        .await?;

    let mut artifacts = BTreeMap::new();
    artifacts.insert(DetectionArtifacts::WEIGHTS.to_string(), weights.clone());
    store
        .put(
            ModelKind::Tagging,
            ResolvedModel::new(config.model.as_str(), artifacts)
                .with_revision(config.revision.clone())
                .with_variant(Some(config.weights_file.clone())),
        )
        .await?;

    Ok(DetectionArtifacts { weights, labels })
}

/// Resolve Florence-2 ONNX artifacts for `config`, downloading into the store's models cache when needed
pub async fn resolve_captioning(
    config: &CaptioningConfig,
    store: &ModelStateStore,
) -> Result<CaptionArtifacts> {
    let cache_dir = store.models_cache();
    if let Some(ref checkpoints) = config.checkpoints {
        if checkpoints.is_dir() {
            debug!("Using configured checkpoints {}", checkpoints.display());
            return CaptionArtifacts::find_in(checkpoints, &config.onnx_subfolder);
        }
        warn!(
            "Configured checkpoints {} do not exist, resolving '{}' instead",
            checkpoints.display(),
            config.model
        );
    }

    let local = local_model_path(&config.model, cache_dir);
    let local = local.as_path();
    if local.is_dir() {
        debug!("Using local captioning model {}", local.display());
        return CaptionArtifacts::find_in(local, &config.onnx_subfolder);
    }

    let source = captioning_source(config);
    if let Some(record) = store.get(ModelKind::Captioning).await {
        if record.is_usable(&source, &CaptionArtifacts::role_names()) {
            if let Some(artifacts) = CaptionArtifacts::from_map(&record.artifacts) {
                info!("Using previously resolved captioning artifacts");
                return Ok(artifacts);
            }
        }
        debug!("State record for captioning is stale, resolving again");
    }

    info!(
        "Downloading captioning model {} into {}",
        config.model,
        cache_dir.display()
    );
    let downloader = ModelDownloader::new(cache_dir).await?;
    let mut map = BTreeMap::new();
    for (role, file) in CaptionArtifacts::ROLES {
        let filename = if file.ends_with(".onnx") && !config.onnx_subfolder.is_empty() {
            format!("{}/{}", config.onnx_subfolder.trim_end_matches('/'), file)
        } else {
            file.to_string()
        };
        let path = downloader
            .fetch(
                &HubFile::new(config.model.as_str(), filename)
                    .with_revision(config.revision.clone()),
            )
            .await?;
        map.insert(role.to_string(), path);
    }

    let artifacts = CaptionArtifacts::from_map(&map).context("Incomplete captioning download")?;
    store
        .put(
            ModelKind::Captioning,
            ResolvedModel::new(config.model.as_str(), artifacts.to_map())
                .with_revision(config.revision.clone())
                .with_variant(Some(config.onnx_subfolder.clone())),
        )
        .await?;

    Ok(artifacts)
}
