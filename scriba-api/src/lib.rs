//! scriba-api library interface
//!
//! Exposes the application state and router for integration testing.

pub mod api;
pub mod error;
pub mod services;
pub mod storage;
pub mod subtitles;

pub use crate::error::{ApiError, ApiResult};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use scriba_common::AppConfig;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::identity_client::IdentityClient;
use crate::storage::FileStore;

/// User-agent sent on every outbound HTTP request
pub const USER_AGENT: &str = concat!("Scriba/", env!("CARGO_PKG_VERSION"));

/// Upload size cap (50 MB)
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Service configuration (vendor credentials, language hint, identity)
    pub config: Arc<AppConfig>,
    /// Blob storage for uploaded media
    pub storage: FileStore,
    /// Shared HTTP client for vendor calls and source URL fetches
    pub http: reqwest::Client,
    /// External identity service, None in open (single local user) mode
    pub identity: Option<IdentityClient>,
    /// Project ids with a transcription currently in flight
    pub in_flight: Arc<Mutex<HashSet<i64>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: AppConfig) -> scriba_common::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                scriba_common::Error::Internal(format!("failed to build HTTP client: {}", e))
            })?;

        let identity = config
            .identity
            .as_ref()
            .map(|cfg| IdentityClient::new(http.clone(), cfg.api_url.clone(), cfg.api_key.clone()));

        let storage = FileStore::new(config.uploads_path());

        Ok(Self {
            db,
            config: Arc::new(config),
            storage,
            http,
            identity,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = Router::new()
        .merge(api::projects::routes())
        .merge(api::transcribe::routes())
        .merge(api::subtitles::routes())
        .merge(api::tts::routes())
        .merge(api::auth::user_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth::require_user,
        ));

    Router::new()
        .merge(api::health::routes())
        .merge(api::auth::session_routes())
        .merge(protected)
        // Uploads are capped at 50 MB in the handler; leave room for
        // multipart framing overhead above the cap.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 1024 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
