//! Merge and edit-commit endpoints.
//!
//! Both endpoints are stateless: each request carries the full source
//! selection (and, for commits, the edits), a [`MergeSession`] is opened
//! for the request, and nothing is held on the server between calls. The
//! caller keeps its own pending-edit state between views.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use bommerge_core::errors::{MergeError, RegistryError};
use bommerge_core::merge::{ConflictMap, FieldEdit, MergeSession};
use bommerge_core::models::PartRecord;

use crate::api::status::{lock_db, AppError};
use crate::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct MergeRequest {
    /// Stable source ids (preferred identity).
    #[serde(default)]
    pub source_ids: Vec<String>,
    /// Display names; used as a fallback when an id no longer resolves,
    /// or alone for legacy callers.
    #[serde(default)]
    pub source_names: Vec<String>,
}

#[derive(Serialize)]
struct MergeResponse {
    records: Vec<PartRecord>,
    record_count: usize,
    conflicts: ConflictMap,
}

#[derive(Deserialize)]
pub struct CommitEditsRequest {
    #[serde(default)]
    pub source_ids: Vec<String>,
    #[serde(default)]
    pub source_names: Vec<String>,
    pub edits: Vec<FieldEdit>,
}

#[derive(Serialize)]
struct CommitEditsResponse {
    updated_count: usize,
    records: Vec<PartRecord>,
    conflicts: ConflictMap,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/merge", post(merge))
        .route("/api/merge/edits", post(commit_edits))
}

fn merge_error(e: MergeError) -> AppError {
    match e {
        MergeError::EmptySelection => {
            AppError::BadRequest("at least one source id or name is required".into())
        }
        MergeError::Registry(RegistryError::UnknownSource(id)) => {
            AppError::NotFound(format!("unknown source id: {}", id))
        }
        MergeError::Registry(RegistryError::UnknownSourceName(name)) => {
            AppError::NotFound(format!("unknown source name: {}", name))
        }
        MergeError::Registry(RegistryError::Database(e)) | MergeError::Database(e) => {
            AppError::Internal(format!("database error: {}", e))
        }
    }
}

async fn merge(
    State(state): State<Arc<AppState>>,
    Json(body): Json<MergeRequest>,
) -> Result<Json<MergeResponse>, AppError> {
    let db = lock_db(&state)?;
    let session = MergeSession::open_with_fallback(&db, &body.source_ids, &body.source_names)
        .map_err(merge_error)?;

    let conflicts = session.conflicts();
    let records = session.records().to_vec();
    Ok(Json(MergeResponse {
        record_count: records.len(),
        records,
        conflicts,
    }))
}

async fn commit_edits(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CommitEditsRequest>,
) -> Result<Json<CommitEditsResponse>, AppError> {
    let db = lock_db(&state)?;
    let mut session = MergeSession::open_with_fallback(&db, &body.source_ids, &body.source_names)
        .map_err(merge_error)?;

    // Edits addressing identity fields or unknown records are dropped, not
    // rejected; the commit result reflects what actually changed.
    session.stage_all(&body.edits);
    let outcome = session.commit(&db).map_err(merge_error)?;

    Ok(Json(CommitEditsResponse {
        updated_count: outcome.updated_count,
        records: outcome.records,
        conflicts: outcome.conflicts,
    }))
}
