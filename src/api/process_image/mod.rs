// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process image API endpoint module
//!
//! Provides POST /process_image: tags as label counts, optionally a caption.

pub mod handler;
pub mod request;

pub use handler::process_image_handler;
pub use request::ProcessImageRequest;
