// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process image form fields

use crate::api::errors::ApiError;
use crate::api::multipart::{parse_bool, parse_threshold, UploadForm};
use crate::pipeline::TagRequest;
use crate::tagging::{TagMode, DEFAULT_THRESHOLD};

/// Form fields accepted by POST /process_image
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessImageRequest {
    pub threshold: f32,
    pub add_caption: bool,
    /// Return distinct labels instead of per-label counts
    pub remove_duplicates: bool,
    /// Echoed back in `data.file_name` when supplied
    pub file_name: Option<String>,
    pub req_id: Option<String>,
    pub job_id: Option<String>,
}

impl Default for ProcessImageRequest {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            add_caption: false,
            remove_duplicates: false,
            file_name: None,
            req_id: None,
            job_id: None,
        }
    }
}

impl ProcessImageRequest {
    pub fn from_form(form: &UploadForm) -> Result<Self, ApiError> {
        Ok(Self {
            threshold: parse_threshold("threshold", form.field("threshold"), DEFAULT_THRESHOLD)?,
            add_caption: parse_bool("add_caption", form.field("add_caption"), false)?,
            remove_duplicates: parse_bool(
                "remove_duplicates",
                form.field("remove_duplicates"),
                false,
            )?,
            file_name: form.field("file_name").map(str::to_string),
            req_id: form.field("req_id").map(str::to_string),
            job_id: form.field("job_id").map(str::to_string),
        })
    }

    pub fn tag_request(&self) -> TagRequest {
        TagRequest {
            threshold: self.threshold,
            mode: if self.remove_duplicates {
                TagMode::Dedup
            } else {
                TagMode::Counts
            },
            add_caption: self.add_caption,
        }
    }
}
