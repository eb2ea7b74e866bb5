//! Deepgram client (tertiary vendor)
//!
//! Single synchronous POST of the raw audio bytes with a language hint.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use super::{error_body, ProviderError, ProviderTranscript, TranscriptionProvider};

const DEEPGRAM_LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";

#[derive(Debug, Deserialize)]
struct ListenResponse {
    results: ListenResults,
}

#[derive(Debug, Deserialize)]
struct ListenResults {
    channels: Vec<Channel>,
}

#[derive(Debug, Deserialize)]
struct Channel {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
}

/// Deepgram pre-recorded audio client
pub struct DeepgramClient {
    http: reqwest::Client,
    api_key: String,
    language: String,
    endpoint: String,
}

impl DeepgramClient {
    pub fn new(http: reqwest::Client, api_key: String, language: String) -> Self {
        Self {
            http,
            api_key,
            language,
            endpoint: DEEPGRAM_LISTEN_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (test stand-in servers)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TranscriptionProvider for DeepgramClient {
    fn name(&self) -> &'static str {
        "deepgram"
    }

    async fn transcribe(
        &self,
        audio: Bytes,
        content_type: &str,
    ) -> Result<ProviderTranscript, ProviderError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("smart_format", "true"), ("language", self.language.as_str())])
            .header("Authorization", format!("Token {}", self.api_key))
            .header("Content-Type", content_type)
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

        let parsed: ListenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let text = parsed
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .ok_or_else(|| {
                ProviderError::Parse("response contained no transcript alternatives".to_string())
            })?;

        Ok(ProviderTranscript {
            text,
            transcript_id: None,
        })
    }
}
