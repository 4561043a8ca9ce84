// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tag image API endpoint module
//!
//! Provides POST /tag_image: the raw label list, no caption.

pub mod handler;
pub mod request;

pub use handler::tag_image_handler;
pub use request::TagImageRequest;
