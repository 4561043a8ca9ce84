// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Florence-2 encoders
//!
//! The vision encoder turns pixels into image features; the text encoder
//! runs over image features concatenated with the prompt embeddings.

use anyhow::{Context, Result};
use ndarray::{Array2, Array3, Array4, Ix3};
use ort::value::Value;
use std::path::Path;
use tracing::{debug, info};

use super::preprocessing::CAPTION_INPUT_SIZE;
use crate::config::Device;
use crate::vision::session::{self, SharedSession};

/// Florence-2 DaViT vision encoder
pub struct VisionEncoder {
    session: SharedSession,
    input_name: String,
}

impl std::fmt::Debug for VisionEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionEncoder")
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl VisionEncoder {
    pub fn load(model_path: &Path, device: Device) -> Result<Self> {
        info!("Loading vision encoder from {}", model_path.display());
        let session = session::build_session(model_path, device)?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "pixel_values".to_string());

        Ok(Self {
            session: session::shared(session),
            input_name,
        })
    }

    /// Encode a `[1, 3, H, W]` tensor into `[1, tokens, dim]` image features
    pub fn encode(&self, pixels: Array4<f32>) -> Result<Array3<f32>> {
        let shape = pixels.shape();
        if shape.len() != 4 || shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }
        if shape[2] != CAPTION_INPUT_SIZE as usize || shape[3] != CAPTION_INPUT_SIZE as usize {
            debug!(
                "Input size {}x{} differs from expected {}x{}",
                shape[2], shape[3], CAPTION_INPUT_SIZE, CAPTION_INPUT_SIZE
            );
        }

        let input_value = Value::from_array(pixels).context("Failed to create input tensor")?;

        let mut session = session::lock(&self.session)?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Vision encoder inference failed")?;

        let features = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract image features")?;
        debug!("Image features shape: {:?}", features.shape());

        to_array3(features.to_owned(), "image features")
    }
}

/// Florence-2 BART text encoder
pub struct TextEncoder {
    session: SharedSession,
}

impl std::fmt::Debug for TextEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextEncoder").finish_non_exhaustive()
    }
}

impl TextEncoder {
    pub fn load(model_path: &Path, device: Device) -> Result<Self> {
        info!("Loading text encoder from {}", model_path.display());
        let session = session::build_session(model_path, device)?;
        debug!("Text encoder inputs: {:?}", session::input_names(&session));

        Ok(Self {
            session: session::shared(session),
        })
    }

    /// Encode `[1, len, dim]` embeddings into `[1, len, dim]` hidden states
    pub fn encode(&self, inputs_embeds: Array3<f32>, attention_mask: Array2<i64>) -> Result<Array3<f32>> {
        let embeds_value =
            Value::from_array(inputs_embeds).context("Failed to create inputs_embeds tensor")?;
        let mask_value =
            Value::from_array(attention_mask).context("Failed to create attention mask tensor")?;

        let mut session = session::lock(&self.session)?;
        let outputs = session
            .run(ort::inputs![
                "inputs_embeds" => embeds_value,
                "attention_mask" => mask_value
            ])
            .context("Text encoder inference failed")?;

        let hidden = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract encoder hidden states")?;
        debug!("Encoder hidden states shape: {:?}", hidden.shape());

        to_array3(hidden.to_owned(), "encoder hidden states")
    }
}

pub(super) fn to_array3(array: ndarray::ArrayD<f32>, what: &str) -> Result<Array3<f32>> {
    let shape = array.shape().to_vec();
    array
        .into_dimensionality::<Ix3>()
        .map_err(|_| anyhow::anyhow!("Expected 3-D {}, got shape {:?}", what, shape))
}
