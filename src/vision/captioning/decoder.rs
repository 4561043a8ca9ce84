// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Florence-2 token embedding and language decoder

use anyhow::{Context, Result};
use ndarray::{s, Array2, Array3};
use ort::value::Value;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use super::encoder::to_array3;
use crate::config::Device;
use crate::vision::session::{self, SharedSession};

/// Minimum tokens to generate
pub const MIN_TOKENS: usize = 10;

/// Maximum tokens to generate
pub const MAX_TOKENS: usize = 500;

/// Size of n-grams that may not repeat within one caption
pub const NO_REPEAT_NGRAM_SIZE: usize = 3;

/// Maps token ids to input embeddings (shared by encoder and decoder)
pub struct TokenEmbedder {
    session: SharedSession,
}

impl std::fmt::Debug for TokenEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEmbedder").finish_non_exhaustive()
    }
}

impl TokenEmbedder {
    pub fn load(model_path: &Path, device: Device) -> Result<Self> {
        info!("Loading embed_tokens from {}", model_path.display());
        let session = session::build_session(model_path, device)?;
        Ok(Self {
            session: session::shared(session),
        })
    }

    /// `[1, len, dim]` embeddings for `ids`
    pub fn embed(&self, ids: &[u32]) -> Result<Array3<f32>> {
        let input_ids = Array2::from_shape_fn((1, ids.len()), |(_, i)| ids[i] as i64);
        let input_value =
            Value::from_array(input_ids).context("Failed to create input IDs tensor")?;

        let mut session = session::lock(&self.session)?;
        let outputs = session
            .run(ort::inputs!["input_ids" => input_value])
            .context("embed_tokens inference failed")?;

        let embeds = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract embeddings tensor")?;
        to_array3(embeds.to_owned(), "token embeddings")
    }
}

/// BART language decoder, run without a KV cache
pub struct CaptionDecoder {
    session: SharedSession,
}

impl std::fmt::Debug for CaptionDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionDecoder").finish_non_exhaustive()
    }
}

impl CaptionDecoder {
    pub fn load(model_path: &Path, device: Device) -> Result<Self> {
        info!("Loading caption decoder from {}", model_path.display());
        let session = session::build_session(model_path, device)?;
        debug!("Decoder inputs: {:?}", session::input_names(&session));
        Ok(Self {
            session: session::shared(session),
        })
    }

    /// Logits for the position after the last of `inputs_embeds`
    pub fn next_logits(
        &self,
        encoder_hidden_states: &Array3<f32>,
        inputs_embeds: Array3<f32>,
    ) -> Result<Vec<f32>> {
        let encoder_len = encoder_hidden_states.dim().1;
        let encoder_mask = Array2::<i64>::ones((1, encoder_len));

        let hidden_value = Value::from_array(encoder_hidden_states.to_owned())
            .context("Failed to create encoder hidden states tensor")?;
        let mask_value = Value::from_array(encoder_mask)
            .context("Failed to create encoder attention mask tensor")?;
        let embeds_value =
            Value::from_array(inputs_embeds).context("Failed to create inputs_embeds tensor")?;

        let mut session = session::lock(&self.session)?;
        let outputs = session
            .run(ort::inputs![
                "encoder_hidden_states" => hidden_value,
                "encoder_attention_mask" => mask_value,
                "inputs_embeds" => embeds_value
            ])
            .context("Decoder inference failed")?;

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract logits tensor")?;
        let logits = to_array3(logits.to_owned(), "logits")?;

        let last = logits
            .dim()
            .1
            .checked_sub(1)
            .ok_or_else(|| anyhow::anyhow!("Decoder returned no positions"))?;
        Ok(logits.slice(s![0, last, ..]).to_vec())
    }
}

/// Tokens that would complete an n-gram already present in `tokens`
pub fn banned_ngram_tokens(tokens: &[u32], n: usize) -> HashSet<u32> {
    let mut banned = HashSet::new();
    if n == 0 || tokens.len() + 1 < n {
        return banned;
    }

    let prefix = &tokens[tokens.len() + 1 - n..];
    for window in tokens.windows(n) {
        if window[..n - 1] == *prefix {
            banned.insert(window[n - 1]);
        }
    }
    banned
}

/// Highest-scoring token id not in `banned`
pub fn greedy_pick(logits: &[f32], banned: &HashSet<u32>) -> Result<u32> {
    logits
        .iter()
        .enumerate()
        .filter(|(idx, value)| !banned.contains(&(*idx as u32)) && !value.is_nan())
        .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal))
        .map(|(idx, _)| idx as u32)
        .ok_or_else(|| anyhow::anyhow!("Empty logits vector after filtering"))
}
