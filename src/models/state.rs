// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Resolved-model state file
//!
//! Records where each model kind's artifacts ended up after resolution, so a
//! restart can skip the hub round-trip. The user's configuration file is
//! never touched.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::ModelKind;

/// File name of the state file inside the models cache
pub const STATE_FILE_NAME: &str = "resolved_models.json";

/// What a record was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceKey<'a> {
    pub model: &'a str,
    pub revision: Option<&'a str>,
    /// Kind-specific selector: the weights file for tagging, the ONNX subfolder for captioning
    pub variant: Option<&'a str>,
}

/// Artifacts resolved for one model kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedModel {
    /// Model identifier the artifacts were resolved from
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Role name to local path
    pub artifacts: BTreeMap<String, PathBuf>,
    /// Unix milliseconds
    pub resolved_at: i64,
}

impl ResolvedModel {
    pub fn new(model: impl Into<String>, artifacts: BTreeMap<String, PathBuf>) -> Self {
        Self {
            model: model.into(),
            revision: None,
            variant: None,
            artifacts,
            resolved_at: Utc::now().timestamp_millis(),
        }
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    pub fn with_variant(mut self, variant: Option<String>) -> Self {
        self.variant = variant;
        self
    }

    pub fn source_key(&self) -> SourceKey<'_> {
        SourceKey {
            model: &self.model,
            revision: self.revision.as_deref(),
            variant: self.variant.as_deref(),
        }
    }

    /// True when the record was resolved from `source`, names every role in
    /// `roles`, and every recorded file still exists
    pub fn is_usable(&self, source: &SourceKey<'_>, roles: &[&str]) -> bool {
        self.source_key() == *source
            && roles.iter().all(|role| self.artifacts.contains_key(*role))
            && self.artifacts.values().all(|path| path.is_file())
    }

    pub fn artifact(&self, role: &str) -> Option<&Path> {
        self.artifacts.get(role).map(PathBuf::as_path)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    models: BTreeMap<ModelKind, ResolvedModel>,
}

/// Reader/writer for `<models_cache>/resolved_models.json`
///
/// Clones share one write lock; obtain stores through [`StateStores`] so every
/// writer of the same file serialises its read-modify-write cycle.
#[derive(Debug, Clone)]
pub struct ModelStateStore {
    models_cache: PathBuf,
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl ModelStateStore {
    pub fn new(models_cache: &Path) -> Self {
        Self {
            models_cache: models_cache.to_path_buf(),
            path: models_cache.join(STATE_FILE_NAME),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the state file and downloaded artifacts
    pub fn models_cache(&self) -> &Path {
        &self.models_cache
    }

    /// Record for `kind`, if any
    ///
    /// A missing or unreadable state file is treated as empty.
    pub async fn get(&self, kind: ModelKind) -> Option<ResolvedModel> {
        match self.read().await {
            Ok(mut state) => state.models.remove(&kind),
            Err(e) => {
                warn!("Ignoring state file {}: {:#}", self.path.display(), e);
                None
            }
        }
    }

    pub async fn put(&self, kind: ModelKind, record: ResolvedModel) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut state = self.read().await.unwrap_or_else(|e| {
            warn!("Rewriting unreadable state file {}: {:#}", self.path.display(), e);
            StateFile::default()
        });
        state.models.insert(kind, record);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_vec_pretty(&state).context("Failed to serialise state")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!("Recorded {} artifacts in {}", kind, self.path.display());
        Ok(())
    }

    async fn read(&self) -> Result<StateFile> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(StateFile::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()))
            }
        };
        serde_json::from_slice(&raw)
            .with_context(|| format!("Malformed state file {}", self.path.display()))
    }
}

/// One [`ModelStateStore`] per models cache, shared by every loader
#[derive(Debug, Default, Clone)]
pub struct StateStores {
    stores: Arc<std::sync::Mutex<HashMap<PathBuf, ModelStateStore>>>,
}

impl StateStores {
    pub fn store_for(&self, models_cache: &Path) -> ModelStateStore {
        let mut stores = self
            .stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        stores
            .entry(models_cache.to_path_buf())
            .or_insert_with(|| ModelStateStore::new(models_cache))
            .clone()
    }
}
