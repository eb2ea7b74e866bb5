//! Session authentication
//!
//! The OAuth flow and session storage live in an external identity
//! service; this module holds the session cookie plumbing around it.
//! When no identity service is configured the middleware injects a fixed
//! local user, so the whole API works on a private machine without any
//! login flow.

use axum::{
    extract::{Path, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::services::identity_client::{AuthUser, IdentityError};
use crate::{ApiError, ApiResult, AppState};

/// Name of the session cookie issued on login
pub const SESSION_COOKIE: &str = "scriba_session";

/// Session lifetime baked into the cookie (60 days)
const COOKIE_MAX_AGE_SECONDS: u64 = 60 * 60 * 24 * 60;

/// Unauthenticated session routes: the OAuth handshake and logout
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/api/oauth/:provider/redirect_url", get(oauth_redirect_url))
        .route("/api/sessions", post(create_session))
        .route("/api/logout", get(logout))
}

/// Routes about the authenticated caller (behind `require_user`)
pub fn user_routes() -> Router<AppState> {
    Router::new().route("/api/users/me", get(current_user))
}

/// Middleware resolving the caller behind the session cookie.
///
/// Inserts an [`AuthUser`] extension for downstream handlers. Without a
/// configured identity service every request runs as the local user.
pub async fn require_user(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = match &state.identity {
        None => AuthUser::local(),
        Some(identity) => {
            let token = session_token(&request)
                .ok_or_else(|| ApiError::Unauthorized("no session cookie".to_string()))?;

            identity.get_user(&token).await.map_err(|e| match e {
                IdentityError::InvalidSession => {
                    ApiError::Unauthorized("session expired or invalid".to_string())
                }
                other => ApiError::Internal(format!("identity service error: {}", other)),
            })?
        }
    };

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// GET /api/users/me - the authenticated caller
async fn current_user(Extension(user): Extension<AuthUser>) -> Json<AuthUser> {
    Json(user)
}

/// GET /api/oauth/:provider/redirect_url - start the OAuth flow
async fn oauth_redirect_url(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let identity = state
        .identity
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("no identity service configured".to_string()))?;

    let redirect_url = identity
        .oauth_redirect_url(&provider)
        .await
        .map_err(|e| ApiError::Internal(format!("identity service error: {}", e)))?;

    Ok(Json(json!({ "redirect_url": redirect_url })))
}

#[derive(Debug, Deserialize)]
struct CreateSessionRequest {
    code: String,
}

/// POST /api/sessions - exchange an OAuth code for a session cookie
async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> ApiResult<Response> {
    let identity = state
        .identity
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("no identity service configured".to_string()))?;

    if payload.code.is_empty() {
        return Err(ApiError::BadRequest("code must not be empty".to_string()));
    }

    let token = identity
        .exchange_code(&payload.code)
        .await
        .map_err(|e| ApiError::Unauthorized(format!("code exchange failed: {}", e)))?;

    let cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=None; Secure; Max-Age={}",
        SESSION_COOKIE, token, COOKIE_MAX_AGE_SECONDS
    );

    tracing::info!("session created");
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true })),
    )
        .into_response())
}

/// GET /api/logout - delete the session upstream and clear the cookie
async fn logout(State(state): State<AppState>, request: Request) -> Response {
    if let (Some(identity), Some(token)) = (&state.identity, session_token(&request)) {
        // Best effort: the cookie is cleared even if the upstream delete fails
        if let Err(e) = identity.delete_session(&token).await {
            tracing::warn!(error = %e, "failed to delete session upstream");
        }
    }

    let cookie = format!(
        "{}=; HttpOnly; Path=/; SameSite=None; Secure; Max-Age=0",
        SESSION_COOKIE
    );

    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "success": true })),
    )
        .into_response()
}

/// Extract the session token from the request's Cookie header
fn session_token(request: &Request) -> Option<String> {
    let header = request.headers().get(header::COOKIE)?.to_str().ok()?;
    parse_cookie(header, SESSION_COOKIE)
}

/// Find `name` in a Cookie header value
fn parse_cookie(header: &str, name: &str) -> Option<String> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then(|| value.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_cookie_finds_session_among_others() {
        let header = "theme=dark; scriba_session=tok-abc123; lang=pt";
        assert_eq!(
            parse_cookie(header, SESSION_COOKIE),
            Some("tok-abc123".to_string())
        );
    }

    #[test]
    fn parse_cookie_handles_single_cookie() {
        assert_eq!(
            parse_cookie("scriba_session=xyz", SESSION_COOKIE),
            Some("xyz".to_string())
        );
    }

    #[test]
    fn parse_cookie_misses_absent_and_prefix_names() {
        assert_eq!(parse_cookie("theme=dark", SESSION_COOKIE), None);
        assert_eq!(
            parse_cookie("scriba_session_old=tok", SESSION_COOKIE),
            None
        );
        assert_eq!(parse_cookie("", SESSION_COOKIE), None);
    }
}
