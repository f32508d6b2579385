//! Status and health check endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: String,
}

/// Status response with basic store counts.
#[derive(Serialize)]
struct StatusResponse {
    version: String,
    sources: i64,
    parts: i64,
    snapshots: i64,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", get(get_status))
        .route("/api/status/health", get(health_check))
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn get_status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, AppError> {
    let db = lock_db(&state)?;
    let sources = db
        .count_sources()
        .map_err(|e| AppError::Internal(format!("database error: {}", e)))?;
    let parts = db
        .count_parts()
        .map_err(|e| AppError::Internal(format!("database error: {}", e)))?;
    let snapshots = db
        .count_snapshots()
        .map_err(|e| AppError::Internal(format!("database error: {}", e)))?;

    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        sources,
        parts,
        snapshots,
    }))
}

// ---------------------------------------------------------------------------
// Shared error type for API handlers
// ---------------------------------------------------------------------------

/// Simple API error type that converts to an Axum response.
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    NotImplemented(String),
    Internal(String),
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (axum::http::StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (axum::http::StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (axum::http::StatusCode::CONFLICT, msg),
            AppError::NotImplemented(msg) => (axum::http::StatusCode::NOT_IMPLEMENTED, msg),
            AppError::Internal(msg) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}

/// Lock the shared database handle, mapping a poisoned lock to a 500.
pub fn lock_db(
    state: &AppState,
) -> Result<std::sync::MutexGuard<'_, bommerge_core::db::Database>, AppError> {
    state
        .db
        .lock()
        .map_err(|e| AppError::Internal(format!("db lock: {}", e)))
}
