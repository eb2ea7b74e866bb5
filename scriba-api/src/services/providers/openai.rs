//! OpenAI Whisper client (secondary vendor)
//!
//! Single synchronous multipart request, no polling.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{error_body, ProviderError, ProviderTranscript, TranscriptionProvider};

const OPENAI_TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
const WHISPER_MODEL: &str = "whisper-1";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

/// OpenAI audio transcription client
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    language: String,
    endpoint: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, api_key: String, language: String) -> Self {
        Self {
            http,
            api_key,
            language,
            endpoint: OPENAI_TRANSCRIPTIONS_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (test stand-in servers)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TranscriptionProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn transcribe(
        &self,
        audio: Bytes,
        content_type: &str,
    ) -> Result<ProviderTranscript, ProviderError> {
        let file_part = Part::bytes(audio.to_vec())
            .file_name("audio.mp3")
            .mime_str(content_type)
            .map_err(|e| ProviderError::Parse(format!("invalid content type: {}", e)))?;

        let form = Form::new()
            .part("file", file_part)
            .text("model", WHISPER_MODEL)
            .text("language", self.language.clone())
            .text("response_format", "json");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ProviderError::Api {
                status,
                message: error_body(response).await,
            });
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(ProviderTranscript {
            text: parsed.text,
            transcript_id: None,
        })
    }
}
