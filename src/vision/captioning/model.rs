// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Florence-2 caption model
//!
//! Combines the vision encoder, token embedder, text encoder and language
//! decoder into one greedy captioning pipeline.

use anyhow::{Context, Result};
use image::DynamicImage;
use ndarray::{concatenate, Array2, Axis};
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::decoder::{
    banned_ngram_tokens, greedy_pick, CaptionDecoder, TokenEmbedder, MAX_TOKENS, MIN_TOKENS,
    NO_REPEAT_NGRAM_SIZE,
};
use super::encoder::{TextEncoder, VisionEncoder};
use super::preprocessing::preprocess;
use crate::config::CaptioningConfig;
use crate::models::CaptionArtifacts;
use crate::vision::Captioner;

/// Special token ids used while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SpecialTokens {
    bos: u32,
    eos: u32,
    /// First decoder input (BART starts from `</s>`)
    decoder_start: u32,
}

impl SpecialTokens {
    fn from_tokenizer(tokenizer: &Tokenizer) -> Self {
        let bos = tokenizer.token_to_id("<s>").unwrap_or(0);
        let eos = tokenizer.token_to_id("</s>").unwrap_or(2);
        Self {
            bos,
            eos,
            decoder_start: eos,
        }
    }
}

/// Florence-2 captioning model
pub struct CaptionModel {
    vision_encoder: VisionEncoder,
    embedder: TokenEmbedder,
    text_encoder: TextEncoder,
    decoder: CaptionDecoder,
    tokenizer: Tokenizer,
    special: SpecialTokens,
    prompt: String,
    max_tokens: usize,
}

impl std::fmt::Debug for CaptionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptionModel")
            .field("prompt", &self.prompt)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

impl CaptionModel {
    /// Build all four sessions and the tokenizer
    ///
    /// Blocking: call from `spawn_blocking` inside async code.
    pub fn load(config: &CaptioningConfig, artifacts: &CaptionArtifacts) -> Result<Self> {
        info!("Loading Florence-2 caption model '{}'", config.model);
        let start = Instant::now();

        let tokenizer = Tokenizer::from_file(&artifacts.tokenizer)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;
        let special = SpecialTokens::from_tokenizer(&tokenizer);
        debug!(
            "Tokenizer vocab {}, special tokens {:?}",
            tokenizer.get_vocab_size(true),
            special
        );

        let vision_encoder = VisionEncoder::load(&artifacts.vision_encoder, config.device)?;
        let embedder = TokenEmbedder::load(&artifacts.embed_tokens, config.device)?;
        let text_encoder = TextEncoder::load(&artifacts.encoder, config.device)?;
        let decoder = CaptionDecoder::load(&artifacts.decoder, config.device)?;

        let max_tokens = config.max_tokens.clamp(MIN_TOKENS, MAX_TOKENS);

        info!(
            "✅ Caption model loaded in {} ms (max {} tokens)",
            start.elapsed().as_millis(),
            max_tokens
        );

        Ok(Self {
            vision_encoder,
            embedder,
            text_encoder,
            decoder,
            tokenizer,
            special,
            prompt: config.prompt.clone(),
            max_tokens,
        })
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens
    }

    fn prompt_ids(&self) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(self.prompt.as_str(), true)
            .map_err(|e| anyhow::anyhow!("Failed to encode prompt: {}", e))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn generate(&self, encoder_hidden: &ndarray::Array3<f32>) -> Result<Vec<u32>> {
        let mut tokens = vec![self.special.decoder_start];

        for step in 0..self.max_tokens {
            let next = if step == 0 {
                // forced BOS
                self.special.bos
            } else {
                let embeds = self.embedder.embed(&tokens)?;
                let logits = self.decoder.next_logits(encoder_hidden, embeds)?;
                let banned = banned_ngram_tokens(&tokens, NO_REPEAT_NGRAM_SIZE);
                greedy_pick(&logits, &banned)?
            };

            if next == self.special.eos {
                debug!("Generation stopped at EOS after {} steps", step);
                break;
            }
            tokens.push(next);
        }

        Ok(tokens)
    }
}

impl Captioner for CaptionModel {
    fn caption(&self, image: &DynamicImage) -> Result<String> {
        let start = Instant::now();

        let image_features = self
            .vision_encoder
            .encode(preprocess(image))
            .context("Failed to encode image")?;

        let prompt_embeds = self.embedder.embed(&self.prompt_ids()?)?;
        let inputs_embeds = concatenate(Axis(1), &[image_features.view(), prompt_embeds.view()])
            .context("Image features and prompt embeddings have different widths")?;
        let attention_mask = Array2::<i64>::ones((1, inputs_embeds.dim().1));

        let encoder_hidden = self
            .text_encoder
            .encode(inputs_embeds, attention_mask)
            .context("Failed to encode prompt")?;

        let tokens = self.generate(&encoder_hidden)?;
        let caption = self
            .tokenizer
            .decode(&tokens, true)
            .map_err(|e| anyhow::anyhow!("Decoding failed: {}", e))?
            .trim()
            .to_string();

        debug!(
            "Generated {} tokens in {} ms: '{}'",
            tokens.len(),
            start.elapsed().as_millis(),
            caption
        );
        Ok(caption)
    }
}
