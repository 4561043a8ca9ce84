// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tag image endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use tracing::{error, info};

use super::request::TagImageRequest;
use crate::api::envelope::{generate_req_id, ResponseEnvelope};
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;
use crate::api::multipart::read_form;
use crate::api::upload::process_upload;
use crate::config::ModelKind;
use crate::error::TaggerError;

fn not_loaded() -> ApiError {
    ApiError::NotLoaded(TaggerError::NotConfigured(ModelKind::Tagging).to_string())
}

/// POST /tag_image - Return the labels detected in an uploaded image
///
/// Responds 404 when no detection model is configured.
pub async fn tag_image_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ResponseEnvelope>, ApiErrorResponse> {
    if !state.manager.is_configured(ModelKind::Tagging) {
        return Err(not_loaded().into());
    }

    let multipart = multipart.map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    let mut form = read_form(multipart).await?;

    let request = TagImageRequest::from_form(&form).map_err(|e| {
        let req_id = form.field("req_id").map(str::to_string);
        e.with_req_id(Some(req_id.unwrap_or_else(generate_req_id)))
    })?;
    let req_id = request.req_id.clone().unwrap_or_else(generate_req_id);
    let file = form
        .take_file()
        .map_err(|e| e.with_req_id(Some(req_id.clone())))?;

    info!(
        "tag_image req_id={} bytes={} threshold={}",
        req_id,
        file.bytes.len(),
        request.threshold
    );

    let processed = process_upload(&state, file, request.tag_request())
        .await
        .map_err(|e| {
            let api_error = match e {
                TaggerError::Upload(_) => ApiError::UploadFailed,
                TaggerError::NotConfigured(ModelKind::Tagging) => not_loaded(),
                _ => ApiError::ProcessingFailed,
            };
            error!("tag_image req_id={} failed: {}", req_id, e);
            api_error.with_req_id(Some(req_id.clone()))
        })?;

    Ok(Json(
        ResponseEnvelope::success(processed.tags)
            .with_req_id(Some(req_id))
            .with_job_id(request.job_id),
    ))
}
