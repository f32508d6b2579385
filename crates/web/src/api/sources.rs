//! Source registration and management endpoints.
//!
//! Registration receives already-parsed part records; spreadsheet parsing
//! and column mapping happen in the upload collaborator, not here. The
//! record payload is a closed field set — unknown fields are rejected by
//! deserialization before the registry ever sees them.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use bommerge_core::errors::RegistryError;
use bommerge_core::models::{NewPartRecord, PartRecord, Source};
use bommerge_core::registry::SourceRegistry;

use crate::api::status::{lock_db, AppError};
use crate::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterSourceRequest {
    /// Display name; empty defaults to the filename stem.
    #[serde(default)]
    pub display_name: String,
    pub original_filename: String,
    #[serde(default)]
    pub file_size: i64,
    pub records: Vec<NewPartRecord>,
}

#[derive(Serialize)]
struct SourceResponse {
    id: String,
    display_name: String,
    original_filename: String,
    file_size: i64,
    rows_imported: i64,
    status: String,
    imported_at: String,
}

impl From<Source> for SourceResponse {
    fn from(s: Source) -> Self {
        Self {
            id: s.id,
            display_name: s.display_name,
            original_filename: s.original_filename,
            file_size: s.file_size,
            rows_imported: s.rows_imported,
            status: s.status,
            imported_at: s.imported_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
pub struct RenameSourceRequest {
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sources", get(list_sources).post(register_source))
        .route("/api/sources/{id}", get(get_source).delete(delete_source))
        .route("/api/sources/{id}/parts", get(get_source_parts))
        .route("/api/sources/{id}/name", put(rename_source))
}

fn registry_error(e: RegistryError) -> AppError {
    match e {
        RegistryError::UnknownSource(id) => {
            AppError::NotFound(format!("unknown source id: {}", id))
        }
        RegistryError::UnknownSourceName(name) => {
            AppError::NotFound(format!("unknown source name: {}", name))
        }
        RegistryError::Database(e) => AppError::Internal(format!("database error: {}", e)),
    }
}

async fn list_sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SourceResponse>>, AppError> {
    let db = lock_db(&state)?;
    let sources = SourceRegistry::list(&db).map_err(registry_error)?;
    Ok(Json(sources.into_iter().map(Into::into).collect()))
}

async fn register_source(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterSourceRequest>,
) -> Result<Json<SourceResponse>, AppError> {
    if body.original_filename.trim().is_empty() && body.display_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "either display_name or original_filename is required".into(),
        ));
    }

    let db = lock_db(&state)?;
    let source = SourceRegistry::register(
        &db,
        &body.display_name,
        &body.original_filename,
        body.file_size,
        body.records,
    )
    .map_err(registry_error)?;

    Ok(Json(source.into()))
}

async fn get_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SourceResponse>, AppError> {
    let db = lock_db(&state)?;
    let source = SourceRegistry::get(&db, &id).map_err(registry_error)?;
    Ok(Json(source.into()))
}

async fn get_source_parts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<PartRecord>>, AppError> {
    let db = lock_db(&state)?;
    let parts = SourceRegistry::resolve_by_ids(&db, &[id]).map_err(registry_error)?;
    Ok(Json(parts))
}

async fn rename_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<RenameSourceRequest>,
) -> Result<Json<SourceResponse>, AppError> {
    if body.display_name.trim().is_empty() {
        return Err(AppError::BadRequest("display_name must not be empty".into()));
    }

    let db = lock_db(&state)?;
    let source = SourceRegistry::rename(&db, &id, body.display_name.trim())
        .map_err(registry_error)?;
    Ok(Json(source.into()))
}

async fn delete_source(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = lock_db(&state)?;
    let parts_deleted = SourceRegistry::delete(&db, &id).map_err(registry_error)?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "parts_deleted": parts_deleted,
    })))
}
