// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Response envelopes shared by the HTTP handlers and the CLI

use rand::Rng;
use serde::Serialize;

use crate::tagging::TagSet;

/// Payload of a successful response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseData {
    pub tags: TagSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// `{status: "success", time_msec, data, req_id?, job_id?}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub status: &'static str,
    /// Unix milliseconds at build time
    pub time_msec: i64,
    pub data: ResponseData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl ResponseEnvelope {
    pub fn success(tags: TagSet) -> Self {
        Self {
            status: "success",
            time_msec: chrono::Utc::now().timestamp_millis(),
            data: ResponseData {
                tags,
                caption: None,
                file_name: None,
            },
            req_id: None,
            job_id: None,
        }
    }

    pub fn with_caption(mut self, caption: Option<String>) -> Self {
        self.data.caption = caption;
        self
    }

    pub fn with_file_name(mut self, file_name: Option<String>) -> Self {
        self.data.file_name = file_name;
        self
    }

    pub fn with_req_id(mut self, req_id: Option<String>) -> Self {
        self.req_id = req_id;
        self
    }

    pub fn with_job_id(mut self, job_id: Option<String>) -> Self {
        self.job_id = job_id;
        self
    }
}

/// `{status: "error", message, req_id?}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorEnvelope {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>, req_id: Option<String>) -> Self {
        Self {
            status: "error",
            message: message.into(),
            req_id,
        }
    }
}

/// Synthesise a request id: unix nanoseconds plus two random offsets in 1..=64000
pub fn generate_req_id() -> String {
    let now_ns = chrono::Utc::now()
        .timestamp_nanos_opt()
        .unwrap_or_else(|| chrono::Utc::now().timestamp_micros().saturating_mul(1000));
    let mut rng = rand::thread_rng();
    let jitter = rng.gen_range(1..=64000i64) + rng.gen_range(1..=64000i64);
    (now_ns as i128 + jitter as i128).to_string()
}
