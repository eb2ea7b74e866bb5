//! Text-to-speech endpoint

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use crate::services::elevenlabs_client::ElevenLabsClient;
use crate::{ApiError, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/tts", post(synthesize))
}

#[derive(Debug, Deserialize)]
struct TtsRequest {
    text: String,
    voice_id: String,
}

/// POST /api/tts - synthesize narration audio for arbitrary text
async fn synthesize(
    State(state): State<AppState>,
    Json(payload): Json<TtsRequest>,
) -> ApiResult<Response> {
    let api_key = state
        .config
        .providers
        .elevenlabs_api_key
        .as_ref()
        .ok_or_else(|| {
            ApiError::BadRequest("no text-to-speech provider is configured".to_string())
        })?;

    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".to_string()));
    }
    if payload.voice_id.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "voice_id must not be empty".to_string(),
        ));
    }

    let client = ElevenLabsClient::new(state.http.clone(), api_key.clone());
    let audio = client
        .synthesize(&payload.text, &payload.voice_id)
        .await
        .map_err(|e| ApiError::Internal(format!("speech synthesis failed: {}", e)))?;

    tracing::info!(chars = payload.text.len(), bytes = audio.len(), "narration synthesized");

    Ok((
        [
            (header::CONTENT_TYPE, "audio/mpeg".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"narration.mp3\"".to_string(),
            ),
        ],
        audio,
    )
        .into_response())
}
