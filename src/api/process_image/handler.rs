// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process image endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use tracing::{error, info};

use super::request::ProcessImageRequest;
use crate::api::envelope::{generate_req_id, ResponseEnvelope};
use crate::api::errors::{ApiError, ApiErrorResponse};
use crate::api::http_server::AppState;
use crate::api::multipart::read_form;
use crate::api::upload::process_upload;
use crate::error::TaggerError;

/// POST /process_image - Tag an uploaded image, optionally with a caption
///
/// Tags are `{label: count}` by default, or the distinct labels in detection
/// order when `remove_duplicates` is set.
pub async fn process_image_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ResponseEnvelope>, ApiErrorResponse> {
    let multipart = multipart.map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
    let mut form = read_form(multipart).await?;

    let request = ProcessImageRequest::from_form(&form).map_err(|e| {
        let req_id = form.field("req_id").map(str::to_string);
        e.with_req_id(Some(req_id.unwrap_or_else(generate_req_id)))
    })?;
    let req_id = request.req_id.clone().unwrap_or_else(generate_req_id);
    let file = form
        .take_file()
        .map_err(|e| e.with_req_id(Some(req_id.clone())))?;

    info!(
        "process_image req_id={} bytes={} threshold={} caption={}",
        req_id,
        file.bytes.len(),
        request.threshold,
        request.add_caption
    );

    let processed = process_upload(&state, file, request.tag_request())
        .await
        .map_err(|e| {
            let api_error = match e {
                TaggerError::Upload(_) => ApiError::UploadFailed,
                _ => ApiError::ProcessingFailed,
            };
            error!("process_image req_id={} failed: {}", req_id, e);
            api_error.with_req_id(Some(req_id.clone()))
        })?;

    Ok(Json(
        ResponseEnvelope::success(processed.tags)
            .with_caption(processed.caption)
            .with_file_name(request.file_name)
            .with_req_id(Some(req_id))
            .with_job_id(request.job_id),
    ))
}
