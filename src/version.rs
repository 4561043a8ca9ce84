// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the image tagger

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2026-10-16";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "object-detection-tags",
    "tag-counts",
    "tag-dedup",
    "image-captioning",
    "hub-model-download",
    "resolved-model-state",
    "multipart-upload",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("image-tagger {} ({})", VERSION_NUMBER, BUILD_DATE)
}

/// Get version info for the health endpoint
pub fn get_version_info() -> serde_json::Value {
    serde_json::json!({
        "version": VERSION_NUMBER,
        "date": BUILD_DATE,
        "features": FEATURES,
    })
}
