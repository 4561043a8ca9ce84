// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod envelope;
pub mod errors;
pub mod http_server;
pub mod multipart;
pub mod process_image;
pub mod tag_image;
pub mod upload;

pub use envelope::{generate_req_id, ErrorEnvelope, ResponseData, ResponseEnvelope};
pub use errors::{ApiError, ApiErrorResponse};
pub use http_server::{create_router, start_server, AppState, HealthResponse};
pub use process_image::{process_image_handler, ProcessImageRequest};
pub use tag_image::{tag_image_handler, TagImageRequest};
