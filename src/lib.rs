// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod tagging;
pub mod version;
pub mod vision;

pub use config::{AppConfig, ConfigError, Device, ModelKind};
pub use error::{Result, TaggerError};
pub use pipeline::{process_image, ProcessedImage, TagRequest};
pub use tagging::{extract_tags, TagMode, TagSet, DEFAULT_THRESHOLD};
pub use vision::{Captioner, Detection, Detector, VisionModelManager};
