// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::fmt;

use super::envelope::ErrorEnvelope;

/// Message returned when the upload cannot be stored
pub const UPLOAD_FAILED_MESSAGE: &str = "error in file upload!";

/// Message returned when detection or captioning fails
pub const PROCESSING_FAILED_MESSAGE: &str = "processing error !";

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The requested model kind is not configured
    NotLoaded(String),
    InvalidRequest(String),
    ValidationError {
        field: String,
        message: String,
    },
    PayloadTooLarge(String),
    UploadFailed,
    ProcessingFailed,
}

impl ApiError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::NotLoaded(_) => 404,
            ApiError::InvalidRequest(_) | ApiError::ValidationError { .. } => 422,
            ApiError::PayloadTooLarge(_) => 413,
            ApiError::UploadFailed | ApiError::ProcessingFailed => 500,
        }
    }

    /// Client-facing message; internal failure details are never included
    pub fn message(&self) -> String {
        match self {
            ApiError::NotLoaded(msg) => msg.clone(),
            ApiError::InvalidRequest(msg) => msg.clone(),
            ApiError::ValidationError { field, message } => format!("{}: {}", field, message),
            ApiError::PayloadTooLarge(msg) => msg.clone(),
            ApiError::UploadFailed => UPLOAD_FAILED_MESSAGE.to_string(),
            ApiError::ProcessingFailed => PROCESSING_FAILED_MESSAGE.to_string(),
        }
    }

    pub fn to_response(&self, req_id: Option<String>) -> ErrorEnvelope {
        ErrorEnvelope::new(self.message(), req_id)
    }

    pub fn with_req_id(self, req_id: Option<String>) -> ApiErrorResponse {
        ApiErrorResponse { error: self, req_id }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotLoaded(msg) => write!(f, "Not loaded: {}", msg),
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::UploadFailed => write!(f, "Upload failed"),
            ApiError::ProcessingFailed => write!(f, "Processing failed"),
        }
    }
}

impl std::error::Error for ApiError {}

/// An [`ApiError`] bound to the request id it answers
#[derive(Debug)]
pub struct ApiErrorResponse {
    pub error: ApiError,
    pub req_id: Option<String>,
}

impl From<ApiError> for ApiErrorResponse {
    fn from(error: ApiError) -> Self {
        Self {
            error,
            req_id: None,
        }
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.error.to_response(self.req_id))).into_response()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        ApiErrorResponse::from(self).into_response()
    }
}
