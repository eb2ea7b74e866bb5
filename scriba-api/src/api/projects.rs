//! Project CRUD, media upload, and diagnostics

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use url::Url;

use scriba_common::db::projects::{self, Project, SourceKind};

use crate::services::identity_client::AuthUser;
use crate::{ApiError, ApiResult, AppState, MAX_UPLOAD_BYTES};

/// Upload extensions accepted by the transcription vendors
const ALLOWED_EXTENSIONS: &[&str] = &[
    "flac", "m4a", "mp3", "mp4", "mpeg", "mpga", "oga", "ogg", "wav", "webm",
];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/:id", get(get_project))
        .route("/api/projects/:id/upload", post(upload_file))
        .route("/api/projects/:id/file", get(download_file))
        .route("/api/projects/:id/transcript", put(update_transcript))
        .route("/api/projects/:id/diagnostic", get(diagnostic))
}

#[derive(Debug, Deserialize)]
struct CreateProjectRequest {
    title: String,
    source_type: String,
    #[serde(default)]
    source_url: Option<String>,
}

/// POST /api/projects
async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("title must not be empty".to_string()));
    }

    let kind = SourceKind::parse(&payload.source_type).ok_or_else(|| {
        ApiError::BadRequest(format!(
            "source_type must be \"upload\" or \"url\", got {:?}",
            payload.source_type
        ))
    })?;

    let source_url = match kind {
        SourceKind::Url => {
            let raw = payload
                .source_url
                .as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .ok_or_else(|| {
                    ApiError::BadRequest(
                        "source_url is required for url projects".to_string(),
                    )
                })?;
            Some(validate_source_url(raw)?)
        }
        SourceKind::Upload => None,
    };

    let project =
        projects::create(&state.db, &user.id, title, kind, source_url.as_deref()).await?;

    tracing::info!(project_id = project.id, source = kind.as_str(), "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects
async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(projects::list(&state.db, &user.id).await?))
}

/// GET /api/projects/:id
async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Project>> {
    let project = require_project(&state, id, &user).await?;
    Ok(Json(project))
}

/// POST /api/projects/:id/upload - multipart upload of the media file
async fn upload_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> ApiResult<Json<Project>> {
    let project = require_project(&state, id, &user).await?;

    if project.source_kind() != Some(SourceKind::Upload) {
        return Err(ApiError::BadRequest(
            "project does not take an uploaded file".to_string(),
        ));
    }

    let mut upload: Option<(String, Vec<u8>, String)> = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(sanitize_file_name)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::BadRequest("file field has no filename".to_string()))?;
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field.bytes().await.map_err(multipart_error)?;

        upload = Some((file_name, bytes.to_vec(), content_type));
        break;
    }

    let (file_name, bytes, content_type) =
        upload.ok_or_else(|| ApiError::BadRequest("missing \"file\" field".to_string()))?;

    validate_upload(&file_name, bytes.len())?;

    let key = format!("projects/{}/{}", project.id, file_name);
    state.storage.put(&key, &bytes).await?;
    projects::attach_file(
        &state.db,
        project.id,
        &key,
        &file_name,
        bytes.len() as i64,
        &content_type,
    )
    .await?;

    tracing::info!(project_id = project.id, file = %file_name, size = bytes.len(), "file uploaded");

    let updated = require_project(&state, id, &user).await?;
    Ok(Json(updated))
}

/// GET /api/projects/:id/file - stream back the stored upload
async fn download_file(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let project = require_project(&state, id, &user).await?;

    let file_key = project
        .file_key
        .as_deref()
        .ok_or_else(|| ApiError::NotFound("project has no stored file".to_string()))?;

    let bytes = state.storage.get(file_key).await?;
    let content_type = project
        .file_mime
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

#[derive(Debug, Deserialize)]
struct UpdateTranscriptRequest {
    transcript_text: String,
}

/// PUT /api/projects/:id/transcript - persist user edits to the transcript
async fn update_transcript(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTranscriptRequest>,
) -> ApiResult<Json<Project>> {
    let project = require_project(&state, id, &user).await?;

    projects::set_transcript_text(&state.db, project.id, &payload.transcript_text).await?;

    let updated = require_project(&state, id, &user).await?;
    Ok(Json(updated))
}

#[derive(Debug, Serialize)]
struct SecretsStatus {
    assemblyai: bool,
    openai: bool,
    deepgram: bool,
    elevenlabs: bool,
}

#[derive(Debug, Serialize)]
struct FileInfo {
    source: String,
    size: Option<i64>,
    mime: Option<String>,
}

#[derive(Debug, Serialize)]
struct DiagnosticResponse {
    provider_used: Option<String>,
    last_error: Option<String>,
    secrets_status: SecretsStatus,
    file_info: FileInfo,
}

/// GET /api/projects/:id/diagnostic - why did the last transcription
/// behave the way it did?
async fn diagnostic(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<DiagnosticResponse>> {
    let project = require_project(&state, id, &user).await?;
    let providers = &state.config.providers;

    Ok(Json(DiagnosticResponse {
        provider_used: project.provider_used,
        last_error: project.last_error,
        secrets_status: SecretsStatus {
            assemblyai: providers.assemblyai_api_key.is_some(),
            openai: providers.openai_api_key.is_some(),
            deepgram: providers.deepgram_api_key.is_some(),
            elevenlabs: providers.elevenlabs_api_key.is_some(),
        },
        file_info: FileInfo {
            source: project.source_type,
            size: project.file_size,
            mime: project.file_mime,
        },
    }))
}

/// Fetch a project owned by the caller or 404
pub(crate) async fn require_project(
    state: &AppState,
    id: i64,
    user: &AuthUser,
) -> ApiResult<Project> {
    projects::get(&state.db, id, &user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("project {} not found", id)))
}

/// Map a multipart read failure onto the right status. A body that blows
/// through the router's size limit surfaces here as a 413-class error and
/// must stay a 413; everything else is a malformed request.
fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!(
            "upload exceeds the {} byte limit",
            MAX_UPLOAD_BYTES
        ))
    } else {
        ApiError::BadRequest(format!("malformed multipart body: {}", err))
    }
}

/// Reject an upload that is too large or has a disallowed extension.
/// Size is checked first so an oversized file gets 413, not 415.
fn validate_upload(file_name: &str, size: usize) -> ApiResult<()> {
    if size > MAX_UPLOAD_BYTES {
        return Err(ApiError::PayloadTooLarge(format!(
            "file is {} bytes; the limit is {} bytes",
            size, MAX_UPLOAD_BYTES
        )));
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ApiError::UnsupportedMedia(format!(
            "extension of {:?} is not supported; allowed: {}",
            file_name,
            ALLOWED_EXTENSIONS.join(", ")
        ))),
    }
}

/// Keep only the final path segment and strip characters that could not
/// form a storage key.
fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    base.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' '))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Accept only absolute http(s) URLs as project sources
fn validate_source_url(raw: &str) -> ApiResult<String> {
    let parsed = Url::parse(raw)
        .map_err(|e| ApiError::BadRequest(format!("invalid source_url: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => Err(ApiError::BadRequest(format!(
            "source_url must be http or https, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_allowed_extension_passes() {
        for ext in ALLOWED_EXTENSIONS {
            validate_upload(&format!("audio.{}", ext), 1024).unwrap();
        }
        // Case-insensitive
        validate_upload("AUDIO.MP3", 1024).unwrap();
    }

    #[test]
    fn disallowed_extensions_are_rejected() {
        for name in ["notes.txt", "movie.avi", "archive.zip", "noextension", "trailing."] {
            let err = validate_upload(name, 1024).unwrap_err();
            assert!(
                matches!(err, ApiError::UnsupportedMedia(_)),
                "{} was accepted",
                name
            );
        }
    }

    #[test]
    fn oversized_file_is_413_even_with_bad_extension() {
        let err = validate_upload("huge.txt", MAX_UPLOAD_BYTES + 1).unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge(_)));
    }

    #[test]
    fn exactly_at_the_cap_is_accepted() {
        validate_upload("edge.mp3", MAX_UPLOAD_BYTES).unwrap();
    }

    #[test]
    fn file_names_are_stripped_to_a_safe_base_name() {
        assert_eq!(sanitize_file_name("audio.mp3"), "audio.mp3");
        assert_eq!(sanitize_file_name("../../etc/passwd.mp3"), "passwd.mp3");
        assert_eq!(sanitize_file_name("C:\\tmp\\take 2.wav"), "take 2.wav");
        assert_eq!(sanitize_file_name("we?ird*na|me.ogg"), "weirdname.ogg");
    }

    #[test]
    fn source_urls_must_be_http() {
        validate_source_url("https://example.com/a.mp3").unwrap();
        validate_source_url("http://example.com/a.mp3").unwrap();
        assert!(validate_source_url("ftp://example.com/a.mp3").is_err());
        assert!(validate_source_url("file:///etc/passwd").is_err());
        assert!(validate_source_url("not a url").is_err());
    }
}
