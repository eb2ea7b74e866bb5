//! Transcription endpoint
//!
//! Runs the full pipeline synchronously: resolve the media source, walk
//! the provider cascade, persist the outcome. At most one transcription
//! runs per project at a time; a second concurrent request gets 409.

use axum::{extract::State, routing::post, Extension, Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use scriba_common::db::projects;

use crate::api::projects::require_project;
use crate::services::identity_client::AuthUser;
use crate::services::orchestrator::{OrchestratorError, TranscriptionOrchestrator};
use crate::services::source::resolve_source;
use crate::{ApiError, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/transcribe", post(transcribe))
}

#[derive(Debug, Deserialize)]
struct TranscribeRequest {
    project_id: i64,
}

#[derive(Debug, Serialize)]
struct TranscribeResponse {
    text: String,
    transcript_id: Option<String>,
    provider_used: String,
}

/// POST /api/transcribe
async fn transcribe(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<TranscribeRequest>,
) -> ApiResult<Json<TranscribeResponse>> {
    let project = require_project(&state, payload.project_id, &user).await?;

    let _guard = InFlightGuard::acquire(&state.in_flight, project.id).ok_or_else(|| {
        ApiError::Conflict(format!(
            "a transcription is already running for project {}",
            project.id
        ))
    })?;

    let source = match resolve_source(&project, &state.storage, &state.http).await {
        Ok(source) => source,
        Err(e) if e.is_validation() => {
            return Err(ApiError::BadRequest(e.to_string()));
        }
        Err(e) => {
            projects::set_last_error(&state.db, project.id, &e.to_string()).await?;
            return Err(ApiError::Internal(e.to_string()));
        }
    };

    tracing::info!(
        project_id = project.id,
        bytes = source.bytes.len(),
        content_type = %source.content_type,
        "starting transcription"
    );

    let cancel = CancellationToken::new();
    let orchestrator = TranscriptionOrchestrator::from_config(
        &state.config.providers,
        state.http.clone(),
        cancel,
    );

    match orchestrator
        .transcribe(source.bytes, &source.content_type)
        .await
    {
        Ok(outcome) => {
            projects::set_transcript(
                &state.db,
                project.id,
                &outcome.text,
                outcome.transcript_id.as_deref(),
                outcome.provider,
            )
            .await?;

            Ok(Json(TranscribeResponse {
                text: outcome.text,
                transcript_id: outcome.transcript_id,
                provider_used: outcome.provider.to_string(),
            }))
        }
        Err(err @ OrchestratorError::NoProviders) => {
            projects::set_failed(&state.db, project.id, &err.to_string()).await?;
            Err(ApiError::BadGateway(err.to_string()))
        }
        Err(err @ OrchestratorError::Exhausted { .. }) => {
            tracing::error!(project_id = project.id, error = %err, "transcription failed");
            projects::set_failed(&state.db, project.id, &err.to_string()).await?;
            Err(ApiError::BadGateway(err.to_string()))
        }
    }
}

/// Per-project single-flight guard; releases the slot on drop so every
/// early return and error path frees it.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<i64>>>,
    id: i64,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<i64>>>, id: i64) -> Option<Self> {
        let inserted = lock(set).insert(id);
        inserted.then(|| Self {
            set: set.clone(),
            id,
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.id);
    }
}

fn lock(set: &Mutex<HashSet<i64>>) -> std::sync::MutexGuard<'_, HashSet<i64>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_for_same_project_fails() {
        let set = Arc::new(Mutex::new(HashSet::new()));

        let first = InFlightGuard::acquire(&set, 7);
        assert!(first.is_some());
        assert!(InFlightGuard::acquire(&set, 7).is_none());
        // A different project is unaffected
        assert!(InFlightGuard::acquire(&set, 8).is_some());
    }

    #[test]
    fn drop_releases_the_slot() {
        let set = Arc::new(Mutex::new(HashSet::new()));

        drop(InFlightGuard::acquire(&set, 7).unwrap());
        assert!(InFlightGuard::acquire(&set, 7).is_some());
    }
}
