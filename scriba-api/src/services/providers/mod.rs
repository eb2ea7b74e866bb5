//! Speech-to-text vendor clients
//!
//! Each vendor implements [`TranscriptionProvider`]; the orchestrator
//! iterates them in priority order until one produces a transcript.

pub mod assemblyai;
pub mod deepgram;
pub mod openai;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use assemblyai::AssemblyAiClient;
pub use deepgram::DeepgramClient;
pub use openai::OpenAiClient;

/// Transcript produced by a single vendor attempt
#[derive(Debug, Clone)]
pub struct ProviderTranscript {
    pub text: String,
    /// Vendor-side transcript handle, only set by vendors that offer a
    /// native subtitle export for it
    pub transcript_id: Option<String>,
}

/// Failure of a single vendor attempt
///
/// These never escape the orchestrator: every variant is absorbed as a
/// fall-through to the next vendor in the cascade.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transcription job failed: {0}")]
    JobFailed(String),

    #[error("timed out after {attempts} polling attempts")]
    Timeout { attempts: u32 },

    #[error("unexpected response: {0}")]
    Parse(String),

    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Network(err.to_string())
    }
}

/// Capability interface shared by all speech-to-text vendors
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Vendor tag recorded on the project (`assemblyai`, `openai`, ...)
    fn name(&self) -> &'static str;

    /// Submit audio and return the transcript, blocking (asynchronously)
    /// until the vendor's pipeline completes.
    async fn transcribe(
        &self,
        audio: Bytes,
        content_type: &str,
    ) -> Result<ProviderTranscript, ProviderError>;
}

/// Read an error body for diagnostics, truncated so a vendor cannot flood
/// the logs or the persisted last_error column.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    const MAX_LEN: usize = 512;
    match response.text().await {
        Ok(mut body) => {
            if body.len() > MAX_LEN {
                let mut cut = MAX_LEN;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            body
        }
        Err(_) => String::from("<unreadable body>"),
    }
}
