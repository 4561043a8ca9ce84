// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HTTP router and server bootstrap

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::multipart::MAX_UPLOAD_BYTES;
use super::process_image::process_image_handler;
use super::tag_image::tag_image_handler;
use crate::vision::{ModelStatus, VisionModelManager};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<VisionModelManager>,
    /// Where uploads are staged; the OS temp dir when `None`
    pub scratch_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(manager: Arc<VisionModelManager>) -> Self {
        Self {
            manager,
            scratch_dir: None,
        }
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: serde_json::Value,
    pub models: Vec<ModelStatus>,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: crate::version::get_version_info(),
        models: state.manager.list_models(),
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/process_image", post(process_image_handler))
        .route("/tag_image", post(tag_image_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .with_state(state)
}

/// Serve on `addr` until Ctrl-C
pub async fn start_server(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("🚀 API server listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down API server");
        })
        .await?;

    Ok(())
}
