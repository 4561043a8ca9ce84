// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tag image form fields

use crate::api::errors::ApiError;
use crate::api::multipart::{parse_bool, parse_threshold, UploadForm};
use crate::pipeline::TagRequest;
use crate::tagging::{TagMode, DEFAULT_THRESHOLD};

/// Form fields accepted by POST /tag_image
#[derive(Debug, Clone, PartialEq)]
pub struct TagImageRequest {
    pub threshold: f32,
    pub remove_duplicates: bool,
    pub req_id: Option<String>,
    pub job_id: Option<String>,
}

impl TagImageRequest {
    pub fn from_form(form: &UploadForm) -> Result<Self, ApiError> {
        Ok(Self {
            threshold: parse_threshold("threshold", form.field("threshold"), DEFAULT_THRESHOLD)?,
            remove_duplicates: parse_bool(
                "remove_duplicates",
                form.field("remove_duplicates"),
                false,
            )?,
            req_id: form.field("req_id").map(str::to_string),
            job_id: form.field("job_id").map(str::to_string),
        })
    }

    /// Never captions; one label per detection unless deduplicated
    pub fn tag_request(&self) -> TagRequest {
        TagRequest {
            threshold: self.threshold,
            mode: if self.remove_duplicates {
                TagMode::Dedup
            } else {
                TagMode::Raw
            },
            add_caption: false,
        }
    }
}
