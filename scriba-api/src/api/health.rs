//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// GET /health - liveness probe, unauthenticated
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let uptime = (Utc::now() - state.startup_time).num_seconds();

    Json(json!({
        "status": "ok",
        "module": "scriba-api",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime,
    }))
}
