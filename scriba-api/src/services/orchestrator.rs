//! Transcription orchestration
//!
//! Vendors are tried in a fixed priority order (AssemblyAI, then OpenAI
//! Whisper, then Deepgram); unconfigured vendors are skipped when the
//! cascade is built. A vendor failure of any kind falls through to the
//! next vendor; only total exhaustion is reported to the caller.

use bytes::Bytes;
use scriba_common::config::ProviderConfig;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::services::providers::{
    AssemblyAiClient, DeepgramClient, OpenAiClient, TranscriptionProvider,
};

/// Final result of a cascade run
#[derive(Debug, Clone)]
pub struct TranscriptionOutcome {
    pub text: String,
    /// Vendor-side transcript handle (primary vendor only)
    pub transcript_id: Option<String>,
    /// Vendor that produced the text
    pub provider: &'static str,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("no transcription provider is configured")]
    NoProviders,

    #[error("all transcription providers failed: {summary}")]
    Exhausted { summary: String },
}

/// Ordered provider cascade
pub struct TranscriptionOrchestrator {
    providers: Vec<Box<dyn TranscriptionProvider>>,
}

impl TranscriptionOrchestrator {
    /// Build a cascade from an explicit provider list (test seam)
    pub fn new(providers: Vec<Box<dyn TranscriptionProvider>>) -> Self {
        Self { providers }
    }

    /// Build the cascade from configured credentials, in priority order.
    /// Vendors without a key are left out entirely.
    pub fn from_config(
        config: &ProviderConfig,
        http: reqwest::Client,
        cancel: CancellationToken,
    ) -> Self {
        let mut providers: Vec<Box<dyn TranscriptionProvider>> = Vec::new();

        if let Some(key) = &config.assemblyai_api_key {
            providers.push(Box::new(AssemblyAiClient::new(
                http.clone(),
                key.clone(),
                config.language.clone(),
                cancel.clone(),
            )));
        }
        if let Some(key) = &config.openai_api_key {
            providers.push(Box::new(OpenAiClient::new(
                http.clone(),
                key.clone(),
                config.language.clone(),
            )));
        }
        if let Some(key) = &config.deepgram_api_key {
            providers.push(Box::new(DeepgramClient::new(
                http,
                key.clone(),
                config.language.clone(),
            )));
        }

        Self { providers }
    }

    /// Names of the configured vendors, in attempt order
    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Run the cascade: first success wins, every failure is absorbed,
    /// exhaustion carries a per-vendor failure summary.
    pub async fn transcribe(
        &self,
        audio: Bytes,
        content_type: &str,
    ) -> Result<TranscriptionOutcome, OrchestratorError> {
        if self.providers.is_empty() {
            return Err(OrchestratorError::NoProviders);
        }

        let mut failures = Vec::new();

        for provider in &self.providers {
            tracing::info!(provider = provider.name(), "attempting transcription");

            match provider.transcribe(audio.clone(), content_type).await {
                Ok(transcript) => {
                    tracing::info!(
                        provider = provider.name(),
                        chars = transcript.text.len(),
                        "transcription succeeded"
                    );
                    return Ok(TranscriptionOutcome {
                        text: transcript.text,
                        transcript_id: transcript.transcript_id,
                        provider: provider.name(),
                    });
                }
                Err(err) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %err,
                        "provider failed, falling through"
                    );
                    failures.push(format!("{}: {}", provider.name(), err));
                }
            }
        }

        Err(OrchestratorError::Exhausted {
            summary: failures.join("; "),
        })
    }
}
