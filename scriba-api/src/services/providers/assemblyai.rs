//! AssemblyAI client (primary vendor)
//!
//! The only asynchronous-job vendor in the cascade: audio is uploaded,
//! a transcript job is created, then job status is polled on a fixed
//! interval with a bounded attempt budget. The poll wait is cancellable
//! so a dropped request stops the loop promptly.
//!
//! Also the only vendor with a native subtitle export, addressed by the
//! transcript id recorded on the project.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{error_body, ProviderError, ProviderTranscript, TranscriptionProvider};
use crate::subtitles::SubtitleFormat;

const ASSEMBLYAI_BASE_URL: &str = "https://api.assemblyai.com/v2";
const POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_POLL_ATTEMPTS: u32 = 60;

#[derive(Debug, Deserialize)]
struct UploadResponse {
    upload_url: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptJob {
    id: String,
    status: JobStatus,
    text: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

/// AssemblyAI API client
pub struct AssemblyAiClient {
    http: reqwest::Client,
    api_key: String,
    language: String,
    base_url: String,
    poll_interval: Duration,
    max_poll_attempts: u32,
    cancel: CancellationToken,
}

impl AssemblyAiClient {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        language: String,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            http,
            api_key,
            language,
            base_url: ASSEMBLYAI_BASE_URL.to_string(),
            poll_interval: POLL_INTERVAL,
            max_poll_attempts: MAX_POLL_ATTEMPTS,
            cancel,
        }
    }

    /// Point the client at a different endpoint (local stand-in servers
    /// in the test suite).
    pub fn with_endpoint(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Override the polling schedule
    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_poll_attempts = max_attempts;
        self
    }

    /// Upload raw audio bytes, returning the vendor-side audio URL
    async fn upload(&self, audio: Bytes) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(format!("{}/upload", self.base_url))
            .header("Authorization", &self.api_key)
            .body(audio)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ProviderError::Api {
                status,
                message: error_body(response).await,
            });
        }

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(upload.upload_url)
    }

    /// Create a transcript job for an uploaded audio URL
    async fn submit(&self, audio_url: &str) -> Result<String, ProviderError> {
        let response = self
            .http
            .post(format!("{}/transcript", self.base_url))
            .header("Authorization", &self.api_key)
            .json(&serde_json::json!({
                "audio_url": audio_url,
                "language_code": self.language,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ProviderError::Api {
                status,
                message: error_body(response).await,
            });
        }

        let job: TranscriptJob = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        Ok(job.id)
    }

    async fn get_job(&self, transcript_id: &str) -> Result<TranscriptJob, ProviderError> {
        let response = self
            .http
            .get(format!("{}/transcript/{}", self.base_url, transcript_id))
            .header("Authorization", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ProviderError::Api {
                status,
                message: error_body(response).await,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }

    /// Poll job status until it leaves the queued/processing states or the
    /// attempt budget is exhausted. Each wait races the cancellation token.
    async fn poll(&self, transcript_id: &str) -> Result<String, ProviderError> {
        for attempt in 1..=self.max_poll_attempts {
            tokio::select! {
                _ = self.cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(self.poll_interval) => {}
            }

            let job = self.get_job(transcript_id).await?;
            match job.status {
                JobStatus::Completed => return Ok(job.text.unwrap_or_default()),
                JobStatus::Error => {
                    return Err(ProviderError::JobFailed(
                        job.error
                            .unwrap_or_else(|| "vendor reported an unspecified error".to_string()),
                    ))
                }
                JobStatus::Queued | JobStatus::Processing => {
                    tracing::debug!(transcript_id, attempt, status = ?job.status, "job still pending");
                }
            }
        }

        Err(ProviderError::Timeout {
            attempts: self.max_poll_attempts,
        })
    }

    /// Fetch the vendor-formatted subtitle export for a finished transcript
    pub async fn fetch_subtitles(
        &self,
        transcript_id: &str,
        format: SubtitleFormat,
    ) -> Result<String, ProviderError> {
        let response = self
            .http
            .get(format!(
                "{}/transcript/{}/{}",
                self.base_url, transcript_id, format
            ))
            .header("Authorization", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ProviderError::Api {
                status,
                message: error_body(response).await,
            });
        }

        response
            .text()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

#[async_trait]
impl TranscriptionProvider for AssemblyAiClient {
    fn name(&self) -> &'static str {
        "assemblyai"
    }

    async fn transcribe(
        &self,
        audio: Bytes,
        _content_type: &str,
    ) -> Result<ProviderTranscript, ProviderError> {
        let audio_url = self.upload(audio).await?;
        tracing::debug!("audio uploaded to AssemblyAI");

        let transcript_id = self.submit(&audio_url).await?;
        tracing::debug!(transcript_id, "transcript job created, polling");

        let text = self.poll(&transcript_id).await?;
        Ok(ProviderTranscript {
            text,
            transcript_id: Some(transcript_id),
        })
    }
}
