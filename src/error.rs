// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Crate-level error type for model loading and the processing pipeline

use thiserror::Error;

use crate::config::{ConfigError, ModelKind};

#[derive(Debug, Error)]
pub enum TaggerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("No {0} model is configured")]
    NotConfigured(ModelKind),

    #[error("Failed to load {kind} model: {message}")]
    ModelLoad { kind: ModelKind, message: String },

    #[error("Failed to store upload: {0}")]
    Upload(#[from] std::io::Error),

    #[error("Inference failed: {0:#}")]
    Inference(anyhow::Error),
}

impl TaggerError {
    pub fn model_load(kind: ModelKind, err: impl std::fmt::Display) -> Self {
        TaggerError::ModelLoad {
            kind,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TaggerError>;
