//! ElevenLabs text-to-speech client
//!
//! Thin pass-through: one request, no retries, no chunking, no caching.

use bytes::Bytes;
use serde_json::json;

use crate::services::providers::{error_body, ProviderError};

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io/v1";
const TTS_MODEL: &str = "eleven_multilingual_v2";

/// ElevenLabs API client
pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(http: reqwest::Client, api_key: String) -> Self {
        Self {
            http,
            api_key,
            base_url: ELEVENLABS_BASE_URL.to_string(),
        }
    }

    /// Point the client at a different endpoint (test stand-in servers)
    pub fn with_endpoint(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Synthesize narration audio (MP3 bytes) for `text` with `voice_id`
    pub async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Bytes, ProviderError> {
        let response = self
            .http
            .post(format!("{}/text-to-speech/{}", self.base_url, voice_id))
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&json!({
                "text": text,
                "model_id": TTS_MODEL,
                "voice_settings": {
                    "stability": 0.4,
                    "similarity_boost": 0.8,
                },
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

        Ok(response.bytes().await?)
    }
}
