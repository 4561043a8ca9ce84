// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Command-line entry: tag one image, or serve the HTTP API

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::api::{start_server, AppState, ResponseEnvelope};
use crate::config::{AppConfig, DEFAULT_CONFIG_PATH};
use crate::pipeline::{process_image, TagRequest};
use crate::tagging::{TagMode, DEFAULT_THRESHOLD};
use crate::vision::VisionModelManager;

/// Tag images with an object detector and optionally caption them
#[derive(Parser, Debug)]
#[command(name = "image-tagger")]
#[command(version = crate::version::VERSION_NUMBER)]
#[command(about = "Tag images with detected object labels, with optional captions", long_about = None)]
pub struct Cli {
    /// Image to tag; ignored when --server is given
    #[arg(long, alias = "img_path")]
    pub img_path: Option<PathBuf>,

    /// Configuration file
    #[arg(long, alias = "config_path", env = "IMAGE_TAGGER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config_path: PathBuf,

    /// Keep detections scoring above this value
    #[arg(long, alias = "tag_threshold", default_value_t = DEFAULT_THRESHOLD)]
    pub tag_threshold: f32,

    /// Also caption the image; ignored when --server is given
    #[arg(long, alias = "add_caption")]
    pub add_caption: bool,

    /// Print distinct labels instead of per-label counts
    #[arg(long, alias = "remove_duplicates")]
    pub remove_duplicates: bool,

    /// Serve the HTTP API on host:port instead of tagging a single image
    #[arg(long, value_name = "HOST:PORT")]
    pub server: Option<String>,

    /// Directory for staged uploads in server mode
    #[arg(long, env = "IMAGE_TAGGER_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,
}

impl Cli {
    fn tag_request(&self) -> Result<TagRequest> {
        if !(0.0..=1.0).contains(&self.tag_threshold) {
            return Err(anyhow!(
                "--tag-threshold must be within [0, 1], got {}",
                self.tag_threshold
            ));
        }
        Ok(TagRequest {
            threshold: self.tag_threshold,
            mode: if self.remove_duplicates {
                TagMode::Dedup
            } else {
                TagMode::Counts
            },
            add_caption: self.add_caption,
        })
    }
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let config = AppConfig::load(&cli.config_path)
        .with_context(|| format!("Cannot use configuration {}", cli.config_path.display()))?;
    info!("Loaded configuration from {}", cli.config_path.display());

    let manager = Arc::new(VisionModelManager::new(Arc::new(config)));

    if let Some(addr) = &cli.server {
        manager.preload().await;
        let mut state = AppState::new(manager);
        if let Some(dir) = &cli.scratch_dir {
            state = state.with_scratch_dir(dir);
        }
        return start_server(addr, state).await;
    }

    let img_path = cli
        .img_path
        .as_deref()
        .ok_or_else(|| anyhow!("--img-path is required unless --server is given"))?;
    let envelope = tag_file(&manager, img_path, cli.tag_request()?).await?;
    println!("{}", serde_json::to_string(&envelope)?);
    Ok(())
}

/// Tag a single file and build the envelope printed by the CLI
pub async fn tag_file(
    manager: &VisionModelManager,
    img_path: &Path,
    request: TagRequest,
) -> Result<ResponseEnvelope> {
    info!(
        "Tagging {} (threshold={}, caption={})",
        img_path.display(),
        request.threshold,
        request.add_caption
    );
    let processed = process_image(manager, img_path, request).await?;
    let file_name = img_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned());

    Ok(ResponseEnvelope::success(processed.tags)
        .with_caption(processed.caption)
        .with_file_name(file_name))
}
