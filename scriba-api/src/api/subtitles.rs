//! Subtitle download endpoint
//!
//! Preferred source is the primary vendor's native export, addressed by
//! the transcript id recorded on the project. Whenever that is not
//! available (other vendor, missing key, vendor error) the file is
//! generated from the stored transcript text instead.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::api::projects::require_project;
use crate::services::identity_client::AuthUser;
use crate::services::providers::AssemblyAiClient;
use crate::subtitles::{self, SubtitleFormat};
use crate::{ApiError, ApiResult, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/subtitles/:format", get(download_subtitles))
}

#[derive(Debug, Deserialize)]
struct SubtitleQuery {
    project_id: i64,
    /// Overrides the transcript id recorded on the project
    #[serde(default)]
    transcript_id: Option<String>,
}

/// GET /api/subtitles/:format?project_id=N
async fn download_subtitles(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(format): Path<String>,
    Query(query): Query<SubtitleQuery>,
) -> ApiResult<Response> {
    let format = SubtitleFormat::parse(&format).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "format must be \"srt\" or \"vtt\", got {:?}",
            format
        ))
    })?;

    let project = require_project(&state, query.project_id, &user).await?;

    let transcript_id = query
        .transcript_id
        .as_deref()
        .or(project.transcript_id.as_deref());
    if let Some(body) = native_export(&state, transcript_id, format).await {
        return Ok(subtitle_response(format, body));
    }

    let text = project
        .transcript_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "project {} has no transcript to build subtitles from",
                project.id
            ))
        })?;

    Ok(subtitle_response(format, subtitles::generate(text, format)))
}

/// Try the primary vendor's subtitle export; any failure falls back to
/// local generation rather than surfacing to the caller.
async fn native_export(
    state: &AppState,
    transcript_id: Option<&str>,
    format: SubtitleFormat,
) -> Option<String> {
    let transcript_id = transcript_id?;
    let api_key = state.config.providers.assemblyai_api_key.as_ref()?;

    let client = AssemblyAiClient::new(
        state.http.clone(),
        api_key.clone(),
        state.config.providers.language.clone(),
        CancellationToken::new(),
    );

    match client.fetch_subtitles(transcript_id, format).await {
        Ok(body) => Some(body),
        Err(e) => {
            tracing::warn!(
                transcript_id,
                error = %e,
                "native subtitle export failed, generating locally"
            );
            None
        }
    }
}

fn subtitle_response(format: SubtitleFormat, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"subtitles.{}\"", format),
            ),
        ],
        body,
    )
        .into_response()
}
