//! External service clients and transcription orchestration

pub mod elevenlabs_client;
pub mod identity_client;
pub mod orchestrator;
pub mod providers;
pub mod source;

pub use orchestrator::{OrchestratorError, TranscriptionOrchestrator, TranscriptionOutcome};
