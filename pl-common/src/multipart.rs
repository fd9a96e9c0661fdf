//! Multipart form helpers shared by the upload endpoints

use crate::backend::FileUpload;
use crate::{Error, Result};
use axum::extract::Multipart;
use tracing::debug;

/// Content type assumed when a part does not declare one
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Upper bound for one upload request body (all files together)
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Collect every file part of a multipart body, in submission order
///
/// Parts without a file name are plain form fields and are skipped.
pub async fn read_files(mut multipart: Multipart) -> Result<Vec<FileUpload>> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(e.body_text()))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().unwrap_or(OCTET_STREAM).to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidInput(e.body_text()))?;

        debug!(file = %file_name, content_type = %content_type, size = bytes.len(), "Received file");
        files.push(FileUpload::new(file_name, content_type, bytes));
    }

    Ok(files)
}
