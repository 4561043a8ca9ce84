// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scoped temporary storage for uploaded images

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use super::http_server::AppState;
use super::multipart::UploadedFile;
use crate::error::{Result, TaggerError};
use crate::pipeline::{self, ProcessedImage, TagRequest};

/// An upload written to a named temp file, deleted when dropped
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    /// Write `bytes` to a fresh temp file in `dir` (the OS temp dir when `None`)
    pub fn write(dir: Option<&Path>, bytes: &[u8]) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("upload-");

        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(bytes)?;
        file.flush()?;

        debug!("Stored upload at {}", file.path().display());
        Ok(Self { file })
    }

    /// [`ScratchFile::write`] on the blocking pool
    pub async fn write_async(dir: Option<PathBuf>, bytes: bytes::Bytes) -> std::io::Result<Self> {
        tokio::task::spawn_blocking(move || Self::write(dir.as_deref(), &bytes))
            .await
            .map_err(std::io::Error::other)?
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Store `file` in the scratch directory and run the pipeline over it
///
/// The scratch file is removed before this returns, whatever the outcome.
pub async fn process_upload(
    state: &AppState,
    file: UploadedFile,
    request: TagRequest,
) -> Result<ProcessedImage> {
    let scratch = ScratchFile::write_async(state.scratch_dir.clone(), file.bytes)
        .await
        .map_err(TaggerError::Upload)?;

    pipeline::process_image(&state.manager, scratch.path(), request).await
}
