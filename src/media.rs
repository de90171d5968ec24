/// Media Store collaborator client.
///
/// Talks to the external object-hosting service over HTTP: local files go up
/// as multipart bodies and come back as canonical URLs with a public id.
/// The shared reqwest client carries a bounded timeout set at startup.
use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

#[derive(Clone)]
pub struct MediaClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// What the host returns for a stored asset.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    pub url: String,
    pub public_id: String,
    /// Present for video assets only.
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Copy)]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl MediaClient {
    pub fn new(base_url: String, api_key: String, http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            base_url,
            api_key,
        }
    }

    /// Uploads a local file and returns the stored asset. The caller owns the
    /// local artifact and its cleanup.
    pub async fn upload(&self, local_path: &Path) -> Result<MediaAsset, AppError> {
        let file_name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin")
            .to_string();

        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|e| AppError::Internal(format!("failed to read upload artifact: {}", e)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        let url = format!("{}/upload", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("media host upload failed: {}", e);
                AppError::Upstream(format!("media host upload failed: {}", e))
            })?
            .error_for_status()
            .map_err(|e| {
                tracing::error!("media host returned error: {}", e);
                AppError::Upstream(format!("media host returned error: {}", e))
            })?;

        let asset: MediaAsset = response.json().await.map_err(|e| {
            tracing::error!("media host returned malformed payload: {}", e);
            AppError::Upstream(format!("media host returned malformed payload: {}", e))
        })?;

        if asset.url.is_empty() {
            return Err(AppError::Upstream(
                "media host returned no usable url".to_string(),
            ));
        }

        Ok(asset)
    }

    /// Removes a previously stored asset. Callers that replace assets treat
    /// failures here as best-effort.
    pub async fn delete(&self, public_id: &str, kind: MediaKind) -> Result<(), AppError> {
        let url = format!("{}/media/{}", self.base_url, public_id);

        self.http_client
            .delete(&url)
            .header("x-api-key", &self.api_key)
            .query(&[("kind", kind.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("media host delete failed: {}", e)))?
            .error_for_status()
            .map_err(|e| AppError::Upstream(format!("media host delete failed: {}", e)))?;

        Ok(())
    }
}

/// Recovers the public id from a canonical asset URL: the last path segment
/// with its extension dropped.
pub fn public_id_from_url(url: &str) -> Option<String> {
    let last_segment = url.rsplit('/').next()?;
    let public_id = last_segment.split('.').next()?;
    if public_id.is_empty() {
        None
    } else {
        Some(public_id.to_string())
    }
}
