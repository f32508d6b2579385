//! Merged-snapshot endpoints: save, list, load, delete, export.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use bommerge_core::errors::SnapshotError;
use bommerge_core::models::{MergedSnapshot, PartRecord};
use bommerge_core::snapshot::SnapshotStore;

use crate::api::status::{lock_db, AppError};
use crate::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SaveSnapshotRequest {
    pub name: String,
    /// Stable ids of the contributing sources (preferred lineage).
    #[serde(default)]
    pub source_ids: Vec<String>,
    /// Display names in effect at merge time (fallback lineage).
    #[serde(default)]
    pub source_names: Vec<String>,
    /// The post-edit working set, exactly as the caller is viewing it.
    pub records: Vec<PartRecord>,
}

#[derive(Serialize)]
struct SnapshotResponse {
    id: i64,
    name: String,
    source_ids: Vec<String>,
    source_names: Vec<String>,
    part_count: i64,
    created_at: String,
}

impl From<MergedSnapshot> for SnapshotResponse {
    fn from(s: MergedSnapshot) -> Self {
        Self {
            id: s.id,
            name: s.name,
            source_ids: s.source_ids,
            source_names: s.source_names,
            part_count: s.part_count,
            created_at: s.created_at.to_rfc3339(),
        }
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/snapshots", get(list_snapshots).post(save_snapshot))
        .route(
            "/api/snapshots/{id}",
            get(get_snapshot).delete(delete_snapshot),
        )
        .route("/api/snapshots/{id}/parts", get(get_snapshot_parts))
        .route(
            "/api/snapshots/{id}/parts/{part_id}",
            axum::routing::delete(delete_snapshot_part),
        )
        .route("/api/snapshots/{id}/export", get(export_snapshot))
}

fn snapshot_error(e: SnapshotError) -> AppError {
    match e {
        SnapshotError::DuplicateName(name) => {
            AppError::Conflict(format!("a merged snapshot named '{}' already exists", name))
        }
        SnapshotError::EmptyRecordSet => {
            AppError::BadRequest("cannot save a snapshot with no records".into())
        }
        SnapshotError::NotFound(id) => {
            AppError::NotFound(format!("merged snapshot {} not found", id))
        }
        SnapshotError::PartNotFound {
            snapshot_id,
            part_id,
        } => AppError::NotFound(format!(
            "part {} not found in merged snapshot {}",
            part_id, snapshot_id
        )),
        SnapshotError::ExportFailed(detail) => {
            AppError::Internal(format!("export failed: {}", detail))
        }
        SnapshotError::Database(e) => AppError::Internal(format!("database error: {}", e)),
    }
}

async fn save_snapshot(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SaveSnapshotRequest>,
) -> Result<Json<SnapshotResponse>, AppError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("snapshot name must not be empty".into()));
    }

    let db = lock_db(&state)?;
    let id = SnapshotStore::save(
        &db,
        &state.config.snapshot,
        name,
        &body.source_ids,
        &body.source_names,
        &body.records,
    )
    .map_err(snapshot_error)?;

    let snapshot = SnapshotStore::get(&db, id).map_err(snapshot_error)?;
    Ok(Json(snapshot.into()))
}

async fn list_snapshots(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SnapshotResponse>>, AppError> {
    let db = lock_db(&state)?;
    let snapshots = SnapshotStore::list(&db).map_err(snapshot_error)?;
    Ok(Json(snapshots.into_iter().map(Into::into).collect()))
}

async fn get_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SnapshotResponse>, AppError> {
    let db = lock_db(&state)?;
    let snapshot = SnapshotStore::get(&db, id).map_err(snapshot_error)?;
    Ok(Json(snapshot.into()))
}

async fn get_snapshot_parts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<PartRecord>>, AppError> {
    let db = lock_db(&state)?;
    let parts = SnapshotStore::parts(&db, id).map_err(snapshot_error)?;
    Ok(Json(parts))
}

async fn delete_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = lock_db(&state)?;
    SnapshotStore::delete(&db, id).map_err(snapshot_error)?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "message": format!("merged snapshot {} deleted", id),
    })))
}

async fn delete_snapshot_part(
    State(state): State<Arc<AppState>>,
    Path((id, part_id)): Path<(i64, i64)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = lock_db(&state)?;
    SnapshotStore::delete_part(&db, id, part_id).map_err(snapshot_error)?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "message": format!("part {} removed from merged snapshot {}", part_id, id),
    })))
}

async fn export_snapshot(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exporter = state.exporter.clone().ok_or_else(|| {
        AppError::NotImplemented("no snapshot exporter is configured".into())
    })?;

    let db = lock_db(&state)?;
    let snapshot = SnapshotStore::get(&db, id).map_err(snapshot_error)?;
    let bytes = SnapshotStore::export(&db, id, exporter.as_ref()).map_err(snapshot_error)?;

    let filename = format!("{}.xlsx", snapshot.name);
    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    ))
}
