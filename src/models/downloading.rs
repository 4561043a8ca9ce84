// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use hf_hub::api::tokio::{Api, ApiBuilder};
use hf_hub::{Repo, RepoType};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable holding an optional Hugging Face access token
pub const HF_TOKEN_ENV: &str = "HF_TOKEN";

/// A single file in a Hugging Face Hub repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubFile {
    pub repo_id: String,
    pub filename: String,
    pub revision: Option<String>,
}

impl HubFile {
    pub fn new(repo_id: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            repo_id: repo_id.into(),
            filename: filename.into(),
            revision: None,
        }
    }

    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    fn repo(&self) -> Repo {
        match self.revision {
            Some(ref revision) => {
                Repo::with_revision(self.repo_id.clone(), RepoType::Model, revision.clone())
            }
            None => Repo::model(self.repo_id.clone()),
        }
    }
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Failed to initialise hub client: {0}")]
    Client(String),
    #[error("Failed to fetch {filename} from {repo_id}: {message}")]
    Fetch {
        repo_id: String,
        filename: String,
        message: String,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches model artifacts from the Hugging Face Hub into the models cache
///
/// Files land under `<cache>/hub` in the hub's own snapshot layout, so a
/// second fetch of the same file is served from disk.
pub struct ModelDownloader {
    api: Api,
    cache_dir: PathBuf,
}

impl std::fmt::Debug for ModelDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDownloader")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl ModelDownloader {
    pub async fn new(models_cache: &Path) -> Result<Self, DownloadError> {
        let cache_dir = models_cache.join("hub");
        tokio::fs::create_dir_all(&cache_dir).await?;

        let token = std::env::var(HF_TOKEN_ENV).ok().filter(|t| !t.is_empty());
        let api = ApiBuilder::new()
            .with_cache_dir(cache_dir.clone())
            .with_token(token)
            .with_progress(false)
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;

        Ok(Self { api, cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Download one file, returning its local path
    pub async fn fetch(&self, file: &HubFile) -> Result<PathBuf, DownloadError> {
        info!(
            "Fetching {} from {}{}",
            file.filename,
            file.repo_id,
            file.revision
                .as_deref()
                .map(|r| format!("@{}", r))
                .unwrap_or_default()
        );

        let start = Instant::now();
        let path = self
            .api
            .repo(file.repo())
            .get(&file.filename)
            .await
            .map_err(|e| DownloadError::Fetch {
                repo_id: file.repo_id.clone(),
                filename: file.filename.clone(),
                message: e.to_string(),
            })?;

        debug!(
            "Fetched {} in {} ms -> {}",
            file.filename,
            start.elapsed().as_millis(),
            path.display()
        );
        Ok(path)
    }

    /// Download several files from the same repository, in order
    pub async fn fetch_all(&self, files: &[HubFile]) -> Result<Vec<PathBuf>, DownloadError> {
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            paths.push(self.fetch(file).await?);
        }
        Ok(paths)
    }
}
