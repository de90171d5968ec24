/// Multipart ingestion helpers.
///
/// Uploaded files are spooled to a temp directory before being pushed to the
/// Media Store. `TempFile` guarantees the local artifact is removed on both
/// the success and failure paths.
use std::path::{Path, PathBuf};

use actix_multipart::Field;
use futures::TryStreamExt;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{AppError, ValidationError};

/// A spooled upload artifact, deleted when dropped.
#[derive(Debug)]
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), "failed to remove temp upload: {}", e);
        }
    }
}

/// Collects a text field into a UTF-8 string.
pub async fn read_text_field(field: &mut Field) -> Result<String, AppError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(|e| {
        tracing::warn!("failed to read multipart field: {}", e);
        AppError::Validation(ValidationError::InvalidFormat("multipart body"))
    })? {
        bytes.extend_from_slice(&chunk);
    }

    String::from_utf8(bytes)
        .map_err(|_| AppError::Validation(ValidationError::InvalidFormat("multipart body")))
}

/// Streams a file field to a fresh temp file under `temp_dir`.
pub async fn save_file_field(field: &mut Field, temp_dir: &Path) -> Result<TempFile, AppError> {
    tokio::fs::create_dir_all(temp_dir)
        .await
        .map_err(|e| AppError::Internal(format!("failed to create temp dir: {}", e)))?;

    // Only the bare file name is kept; client-supplied paths are not trusted.
    let original_name = field
        .content_disposition()
        .get_filename()
        .map(|f| {
            Path::new(f)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload.bin")
                .to_string()
        })
        .unwrap_or_else(|| "upload.bin".to_string());

    let path = temp_dir.join(format!("{}-{}", Uuid::new_v4(), original_name));
    let temp_file = TempFile { path };

    let mut file = tokio::fs::File::create(temp_file.path())
        .await
        .map_err(|e| AppError::Internal(format!("failed to create temp file: {}", e)))?;

    while let Some(chunk) = field.try_next().await.map_err(|e| {
        tracing::warn!("failed to read multipart file field: {}", e);
        AppError::Validation(ValidationError::InvalidFormat("multipart body"))
    })? {
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::Internal(format!("failed to write temp file: {}", e)))?;
    }

    file.flush()
        .await
        .map_err(|e| AppError::Internal(format!("failed to flush temp file: {}", e)))?;

    Ok(temp_file)
}
