// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image captioning with Florence-2 ONNX exports
//!
//! Expected artifacts (see [`crate::models::CaptionArtifacts`]):
//! - `vision_encoder.onnx`: pixels to image features
//! - `embed_tokens.onnx`: token ids to embeddings
//! - `encoder_model.onnx`: text encoder over image features + prompt
//! - `decoder_model.onnx`: language decoder
//! - `tokenizer.json`

pub mod decoder;
pub mod encoder;
pub mod model;
pub mod preprocessing;

pub use model::CaptionModel;
pub use preprocessing::CAPTION_INPUT_SIZE;
