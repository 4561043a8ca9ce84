// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Configuration loading
//!
//! The configuration file is JSON with an optional `tagging` and an optional
//! `captioning` section. It is read once at startup and never written back;
//! resolved artifact locations live in the models state file instead
//! (see [`crate::models::state`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};

use crate::vision::detection::OutputLayout;

/// Default configuration file path
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

/// Default models cache directory
pub const DEFAULT_MODELS_CACHE: &str = "./models";

/// Default caption prompt
pub const DEFAULT_CAPTION_PROMPT: &str = "What does the image describe?";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed configuration {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration has no '{0}' section")]
    MissingSection(ModelKind),

    #[error("Configuration section '{section}' has an empty '{key}'")]
    EmptyKey {
        section: ModelKind,
        key: &'static str,
    },

    #[error("Invalid device '{0}', expected cpu, cuda or cuda:N")]
    InvalidDevice(String),

    #[error("Invalid value for '{key}' in section '{section}': {message}")]
    InvalidValue {
        section: ModelKind,
        key: &'static str,
        message: String,
    },
}

/// The two model kinds this service runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Tagging,
    Captioning,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Tagging, ModelKind::Captioning];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Tagging => "tagging",
            ModelKind::Captioning => "captioning",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution device for ONNX Runtime sessions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Device {
    #[default]
    Cpu,
    /// CUDA device ordinal
    Cuda(i32),
}

impl FromStr for Device {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        match lowered.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|ordinal| ordinal.parse::<i32>().ok())
                .filter(|ordinal| *ordinal >= 0)
                .map(Device::Cuda)
                .ok_or_else(|| ConfigError::InvalidDevice(s.to_string())),
        }
    }
}

impl TryFrom<String> for Device {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}

fn default_weights_file() -> String {
    "model.onnx".to_string()
}

fn default_input_size() -> u32 {
    640
}

fn default_iou_threshold() -> f32 {
    0.45
}

fn default_max_detections() -> usize {
    300
}

fn default_onnx_subfolder() -> String {
    "onnx".to_string()
}

fn default_prompt() -> String {
    DEFAULT_CAPTION_PROMPT.to_string()
}

fn default_max_tokens() -> usize {
    50
}

/// `tagging` section: the object-detection model
#[derive(Debug, Clone, Deserialize)]
pub struct TaggingConfig {
    /// Hub repository id, local `.onnx` file, or local model directory
    pub model: String,

    #[serde(default)]
    pub device: Device,

    /// Already-resolved local weights file; skips resolution when it exists
    #[serde(default)]
    pub weights: Option<PathBuf>,

    /// File fetched from the hub repository
    #[serde(default = "default_weights_file")]
    pub weights_file: String,

    #[serde(default)]
    pub revision: Option<String>,

    /// Class names, one per line; COCO classes when absent
    #[serde(default)]
    pub labels: Option<PathBuf>,

    /// Output layout; detected from the session outputs when absent
    #[serde(default)]
    pub layout: Option<OutputLayout>,

    #[serde(default = "default_input_size")]
    pub input_size: u32,

    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    #[serde(default = "default_max_detections")]
    pub max_detections: usize,

    #[serde(default)]
    pub models_cache: Option<PathBuf>,
}

/// `captioning` section: the image-captioning model
#[derive(Debug, Clone, Deserialize)]
pub struct CaptioningConfig {
    /// Hub repository id or local model directory
    pub model: String,

    #[serde(default)]
    pub device: Device,

    /// Already-resolved local model directory; skips resolution when it exists
    #[serde(default)]
    pub checkpoints: Option<PathBuf>,

    #[serde(default)]
    pub revision: Option<String>,

    /// Repository subfolder holding the ONNX graphs
    #[serde(default = "default_onnx_subfolder")]
    pub onnx_subfolder: String,

    #[serde(default = "default_prompt")]
    pub prompt: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default)]
    pub models_cache: Option<PathBuf>,
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub models_cache: Option<PathBuf>,

    #[serde(default)]
    pub tagging: Option<TaggingConfig>,

    #[serde(default)]
    pub captioning: Option<CaptioningConfig>,
}

impl AppConfig {
    /// Read and validate the configuration file at `path`
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading configuration from {}", path.display());

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&raw, path)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::parse(json, Path::new("<memory>"))
    }

    fn parse(json: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig =
            serde_json::from_str(json).map_err(|source| ConfigError::Parse {
                path: origin.to_path_buf(),
                source,
            })?;
        config.validate()?;

        debug!(
            "Configuration sections - tagging: {}, captioning: {}",
            config.tagging.is_some(),
            config.captioning.is_some()
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref tagging) = self.tagging {
            if tagging.model.trim().is_empty() {
                return Err(ConfigError::EmptyKey {
                    section: ModelKind::Tagging,
                    key: "model",
                });
            }
            if !(tagging.iou_threshold > 0.0 && tagging.iou_threshold <= 1.0) {
                return Err(ConfigError::InvalidValue {
                    section: ModelKind::Tagging,
                    key: "iou_threshold",
                    message: format!("{} is not in (0, 1]", tagging.iou_threshold),
                });
            }
            if tagging.input_size == 0 || tagging.input_size % 32 != 0 {
                return Err(ConfigError::InvalidValue {
                    section: ModelKind::Tagging,
                    key: "input_size",
                    message: format!("{} is not a positive multiple of 32", tagging.input_size),
                });
            }
        }

        if let Some(ref captioning) = self.captioning {
            if captioning.model.trim().is_empty() {
                return Err(ConfigError::EmptyKey {
                    section: ModelKind::Captioning,
                    key: "model",
                });
            }
        }

        Ok(())
    }

    pub fn tagging(&self) -> Result<&TaggingConfig, ConfigError> {
        self.tagging
            .as_ref()
            .ok_or(ConfigError::MissingSection(ModelKind::Tagging))
    }

    pub fn captioning(&self) -> Result<&CaptioningConfig, ConfigError> {
        self.captioning
            .as_ref()
            .ok_or(ConfigError::MissingSection(ModelKind::Captioning))
    }

    pub fn is_configured(&self, kind: ModelKind) -> bool {
        match kind {
            ModelKind::Tagging => self.tagging.is_some(),
            ModelKind::Captioning => self.captioning.is_some(),
        }
    }

    /// Absolute cache directory for a model kind
    ///
    /// A section-level `models_cache` wins over the top-level one.
    pub fn cache_dir(&self, kind: ModelKind) -> PathBuf {
        let section = match kind {
            ModelKind::Tagging => self.tagging.as_ref().and_then(|c| c.models_cache.clone()),
            ModelKind::Captioning => self
                .captioning
                .as_ref()
                .and_then(|c| c.models_cache.clone()),
        };

        let dir = section
            .or_else(|| self.models_cache.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MODELS_CACHE));

        absolutize(&dir)
    }
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
