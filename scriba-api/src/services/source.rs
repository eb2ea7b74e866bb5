//! Media source resolution
//!
//! Turns a project's source descriptor into raw audio bytes plus a
//! content type, either by reading the stored upload or by fetching the
//! external URL. URL responses that are not audio or video are rejected
//! before any transcription vendor is contacted.

use bytes::Bytes;
use scriba_common::db::projects::{Project, SourceKind};
use thiserror::Error;

use crate::storage::FileStore;

const DEFAULT_CONTENT_TYPE: &str = "audio/mpeg";

/// Raw audio ready to hand to the provider cascade
#[derive(Debug, Clone)]
pub struct ResolvedSource {
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Debug, Error)]
pub enum SourceError {
    /// The project has neither a stored file nor a source URL to match
    /// its source kind (validation failure, 400)
    #[error("project has no usable media source")]
    Missing,

    /// The source URL serves something that is not audio or video
    /// (validation failure, 400)
    #[error("source URL is not a direct media file (content-type {0}); upload the file instead")]
    NotMedia(String),

    /// The source URL answered with a non-success status
    #[error("source URL returned status {0}")]
    UpstreamStatus(u16),

    /// The source URL could not be fetched at all
    #[error("failed to fetch source URL: {0}")]
    Network(String),

    /// The stored upload could not be read back
    #[error("stored file could not be read: {0}")]
    Storage(String),
}

impl SourceError {
    /// Whether this is the caller's fault (4xx) rather than ours (5xx)
    pub fn is_validation(&self) -> bool {
        matches!(self, SourceError::Missing | SourceError::NotMedia(_))
    }
}

/// Resolve a project's media source to raw bytes + content type
pub async fn resolve_source(
    project: &Project,
    storage: &FileStore,
    http: &reqwest::Client,
) -> Result<ResolvedSource, SourceError> {
    match (project.source_kind(), &project.file_key, &project.source_url) {
        (Some(SourceKind::Upload), Some(file_key), _) => {
            let bytes = storage
                .get(file_key)
                .await
                .map_err(|e| SourceError::Storage(e.to_string()))?;

            Ok(ResolvedSource {
                bytes: Bytes::from(bytes),
                content_type: project
                    .file_mime
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            })
        }
        (Some(SourceKind::Url), _, Some(source_url)) => fetch_url(source_url, http).await,
        _ => Err(SourceError::Missing),
    }
}

async fn fetch_url(url: &str, http: &reqwest::Client) -> Result<ResolvedSource, SourceError> {
    let response = http
        .get(url)
        .send()
        .await
        .map_err(|e| SourceError::Network(e.to_string()))?;

    if !response.status().is_success() {
        return Err(SourceError::UpstreamStatus(response.status().as_u16()));
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    if !is_media_content_type(&content_type) {
        return Err(SourceError::NotMedia(content_type));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SourceError::Network(e.to_string()))?;

    Ok(ResolvedSource {
        bytes,
        content_type,
    })
}

/// Accept only direct audio/video responses
fn is_media_content_type(content_type: &str) -> bool {
    content_type.starts_with("audio/") || content_type.starts_with("video/")
}
