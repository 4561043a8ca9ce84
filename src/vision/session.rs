// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime session construction shared by the detection and captioning models

use anyhow::{Context, Result};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::config::Device;

/// Intra-op threads per session
const INTRA_THREADS: usize = 4;

/// Build a session for `model_path` on `device`
///
/// A CUDA device that cannot be initialised falls back to CPU with a warning.
pub fn build_session(model_path: &Path, device: Device) -> Result<Session> {
    if !model_path.exists() {
        anyhow::bail!("ONNX model file not found: {}", model_path.display());
    }

    if let Device::Cuda(ordinal) = device {
        debug!(
            "Attempting CUDA execution provider (device {}) for {}",
            ordinal,
            model_path.display()
        );
        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default()
                .with_device_id(ordinal)
                .build()
                .error_on_failure()])
            .context("Failed to set CUDA execution provider")
            .and_then(|b| {
                b.with_optimization_level(GraphOptimizationLevel::Level3)
                    .context("Failed to set optimization level")
            })
            .and_then(|b| {
                b.with_intra_threads(INTRA_THREADS)
                    .context("Failed to set intra threads")
            })
            .and_then(|b| {
                b.commit_from_file(model_path)
                    .context("Failed to load model on CUDA")
            });

        match cuda_result {
            Ok(session) => {
                info!("✅ Loaded {} on cuda:{}", model_path.display(), ordinal);
                return Ok(session);
            }
            Err(e) => {
                warn!("⚠️  CUDA execution provider failed: {:#}", e);
                warn!("   Falling back to CPU execution provider");
            }
        }
    }

    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(INTRA_THREADS)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context(format!(
            "Failed to load ONNX model from {}",
            model_path.display()
        ))?;

    info!("✅ Loaded {} on cpu", model_path.display());
    Ok(session)
}

/// Names of a session's inputs, in declaration order
pub fn input_names(session: &Session) -> Vec<String> {
    session.inputs.iter().map(|i| i.name.clone()).collect()
}

/// Names of a session's outputs, in declaration order
pub fn output_names(session: &Session) -> Vec<String> {
    session.outputs.iter().map(|o| o.name.clone()).collect()
}

/// Shared, exclusively-run session
pub type SharedSession = Arc<Mutex<Session>>;

pub fn shared(session: Session) -> SharedSession {
    Arc::new(Mutex::new(session))
}

/// Lock a shared session, surfacing poisoning as an error
pub fn lock(session: &SharedSession) -> Result<MutexGuard<'_, Session>> {
    session
        .lock()
        .map_err(|_| anyhow::anyhow!("ONNX session mutex poisoned"))
}
