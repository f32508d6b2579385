//! Audit log endpoints.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::status::{lock_db, AppError};
use crate::AppState;

#[derive(Deserialize)]
pub struct ListAuditQuery {
    pub limit: Option<u32>,
}

#[derive(Serialize)]
struct AuditEntryResponse {
    id: i64,
    action: String,
    details: Option<String>,
    success: bool,
    created_at: String,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/api/audit", get(list_audit))
}

async fn list_audit(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAuditQuery>,
) -> Result<Json<Vec<AuditEntryResponse>>, AppError> {
    let limit = query.limit.unwrap_or(50).min(500);

    let db = lock_db(&state)?;
    let entries = db
        .list_audit_log(limit)
        .map_err(|e| AppError::Internal(format!("database error: {}", e)))?;

    let items = entries
        .into_iter()
        .map(|e| AuditEntryResponse {
            id: e.id,
            action: e.action,
            details: e.details,
            success: e.success,
            created_at: e.created_at,
        })
        .collect();

    Ok(Json(items))
}
