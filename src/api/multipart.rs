// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart form reading and form-field parsing

use axum::http::StatusCode;
use axum_extra::extract::multipart::{Multipart, MultipartError};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::errors::ApiError;

/// Name of the form part carrying the image
pub const FILE_FIELD: &str = "file";

/// Maximum accepted upload body
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// The uploaded image part
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub bytes: Bytes,
    /// File name sent by the client in the part headers
    pub file_name: Option<String>,
}

/// All parts of a multipart form
#[derive(Debug, Default)]
pub struct UploadForm {
    pub file: Option<UploadedFile>,
    /// Text fields; empty values are dropped
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn take_file(&mut self) -> Result<UploadedFile, ApiError> {
        self.file
            .take()
            .ok_or_else(|| ApiError::validation(FILE_FIELD, "field required"))
    }
}

fn map_multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge(format!(
            "upload exceeds {} bytes",
            MAX_UPLOAD_BYTES
        ));
    }
    warn!("Failed to read multipart body: {}", err);
    ApiError::UploadFailed
}

/// Read every part of `multipart` into memory
pub async fn read_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == FILE_FIELD {
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await.map_err(map_multipart_error)?;
            debug!("Received upload part: {} bytes", bytes.len());
            form.file = Some(UploadedFile { bytes, file_name });
            continue;
        }

        let value = field.text().await.map_err(map_multipart_error)?;
        let value = value.trim();
        if !value.is_empty() {
            form.fields.insert(name, value.to_string());
        }
    }

    Ok(form)
}

/// Parse a boolean form value: true/false, 1/0, yes/no, on/off
pub fn parse_bool(name: &str, value: Option<&str>, default: bool) -> Result<bool, ApiError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ApiError::validation(
            name,
            format!("'{}' is not a valid boolean", other),
        )),
    }
}

/// Parse a confidence threshold in [0, 1]
pub fn parse_threshold(name: &str, value: Option<&str>, default: f32) -> Result<f32, ApiError> {
    let Some(value) = value else {
        return Ok(default);
    };
    let threshold: f32 = value
        .parse()
        .map_err(|_| ApiError::validation(name, format!("'{}' is not a number", value)))?;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(ApiError::validation(
            name,
            format!("{} is not within [0, 1]", threshold),
        ));
    }
    Ok(threshold)
}
