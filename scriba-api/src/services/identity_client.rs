//! External identity/session service client
//!
//! The OAuth dance and session storage live in an external users service;
//! this client wraps its four calls: obtain an OAuth redirect URL,
//! exchange an authorization code for a session token, resolve the user
//! behind a session token, and delete a session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authenticated caller, resolved once per request by the auth middleware
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl AuthUser {
    /// Fixed user injected when no identity service is configured
    pub fn local() -> Self {
        Self {
            id: "local".to_string(),
            email: "local@localhost".to_string(),
            name: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity service unreachable: {0}")]
    Network(String),

    #[error("identity service error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("session token rejected")]
    InvalidSession,
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        IdentityError::Network(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct RedirectUrlResponse {
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session_token: String,
}

/// Users service API client
#[derive(Clone)]
pub struct IdentityClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl IdentityClient {
    pub fn new(http: reqwest::Client, api_url: String, api_key: String) -> Self {
        Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// OAuth redirect URL for the named upstream provider (e.g. `google`)
    pub async fn oauth_redirect_url(&self, provider: &str) -> Result<String, IdentityError> {
        let response = self
            .http
            .get(format!("{}/oauth/{}/redirect_url", self.api_url, provider))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let parsed: RedirectUrlResponse = check(response).await?.json().await?;
        Ok(parsed.redirect_url)
    }

    /// Exchange an OAuth authorization code for a session token
    pub async fn exchange_code(&self, code: &str) -> Result<String, IdentityError> {
        let response = self
            .http
            .post(format!("{}/sessions", self.api_url))
            .header("x-api-key", &self.api_key)
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await?;

        let parsed: SessionResponse = check(response).await?.json().await?;
        Ok(parsed.session_token)
    }

    /// Resolve the user behind a session token
    pub async fn get_user(&self, session_token: &str) -> Result<AuthUser, IdentityError> {
        let response = self
            .http
            .get(format!("{}/users/me", self.api_url))
            .header("x-api-key", &self.api_key)
            .bearer_auth(session_token)
            .send()
            .await?;

        if response.status().as_u16() == 401 {
            return Err(IdentityError::InvalidSession);
        }

        Ok(check(response).await?.json().await?)
    }

    /// Delete a session upstream (logout)
    pub async fn delete_session(&self, session_token: &str) -> Result<(), IdentityError> {
        let response = self
            .http
            .delete(format!("{}/sessions", self.api_url))
            .header("x-api-key", &self.api_key)
            .bearer_auth(session_token)
            .send()
            .await?;

        check(response).await?;
        Ok(())
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, IdentityError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(IdentityError::Api { status, message })
    }
}
