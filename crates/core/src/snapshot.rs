//! Merged-snapshot persistence.
//!
//! A snapshot is a point-in-time materialization of a merged, edited part
//! set: saving copies every record (copy-on-merge, not referenced), so
//! later renames, edits, or deletions of the contributing sources never
//! reach a saved snapshot. Snapshots are immutable after save except for
//! per-part deletion.

use tracing::{info, warn};

use crate::config::SnapshotConfig;
use crate::db::Database;
use crate::errors::SnapshotError;
use crate::models::{MergedSnapshot, PartRecord};

/// External spreadsheet-writer collaborator.
///
/// Rendering an export file is outside this crate; implementations are
/// injected by the hosting process.
pub trait SnapshotExporter: Send + Sync {
    /// Render a snapshot and its part copies into a downloadable byte
    /// stream (e.g. an .xlsx workbook).
    fn export(
        &self,
        snapshot: &MergedSnapshot,
        parts: &[PartRecord],
    ) -> Result<Vec<u8>, SnapshotError>;
}

/// Stateless snapshot-store operations.
pub struct SnapshotStore;

impl SnapshotStore {
    /// Persist the given working set as a new named snapshot and return
    /// its id.
    ///
    /// Both the stable source ids and the display names in effect at save
    /// time are recorded, so lineage lookups can prefer ids and fall back
    /// to names. The snapshot row and every part copy are written in a
    /// single transaction; a partial snapshot is never visible.
    pub fn save(
        db: &Database,
        config: &SnapshotConfig,
        name: &str,
        source_ids: &[String],
        source_names: &[String],
        records: &[PartRecord],
    ) -> Result<i64, SnapshotError> {
        if records.is_empty() {
            return Err(SnapshotError::EmptyRecordSet);
        }

        if config.enforce_unique_names && db.snapshot_name_exists(name)? {
            warn!(name, "rejecting snapshot save: duplicate name");
            let _ = db.insert_audit_log(
                "snapshot_save_failed",
                Some(&format!("duplicate name '{name}'")),
                false,
            );
            return Err(SnapshotError::DuplicateName(name.to_string()));
        }

        let id = db.insert_snapshot_with_parts(name, source_ids, source_names, records)?;

        let _ = db.insert_audit_log(
            "snapshot_saved",
            Some(&format!(
                "'{name}' (id {id}, {} parts from {} sources)",
                records.len(),
                source_ids.len().max(source_names.len())
            )),
            true,
        );

        info!(id, name, parts = records.len(), "saved merged snapshot");
        Ok(id)
    }

    /// List all snapshots, newest first.
    pub fn list(db: &Database) -> Result<Vec<MergedSnapshot>, SnapshotError> {
        Ok(db.list_snapshots()?)
    }

    /// Get one snapshot by id.
    pub fn get(db: &Database, id: i64) -> Result<MergedSnapshot, SnapshotError> {
        db.get_snapshot(id)?.ok_or(SnapshotError::NotFound(id))
    }

    /// The part copies of a snapshot, in save order.
    pub fn parts(db: &Database, id: i64) -> Result<Vec<PartRecord>, SnapshotError> {
        // Distinguish "no such snapshot" from "snapshot with no parts left".
        if db.get_snapshot(id)?.is_none() {
            return Err(SnapshotError::NotFound(id));
        }
        Ok(db.snapshot_parts(id)?)
    }

    /// Delete a snapshot and all of its part copies.
    pub fn delete(db: &Database, id: i64) -> Result<(), SnapshotError> {
        db.delete_snapshot_and_parts(id).map_err(|e| match e {
            crate::errors::DatabaseError::NotFound { .. } => SnapshotError::NotFound(id),
            other => other.into(),
        })?;

        let _ = db.insert_audit_log("snapshot_deleted", Some(&format!("id {id}")), true);
        info!(id, "deleted merged snapshot");
        Ok(())
    }

    /// Delete a single part copy from a snapshot, leaving the rest intact.
    pub fn delete_part(db: &Database, snapshot_id: i64, part_id: i64) -> Result<(), SnapshotError> {
        if db.get_snapshot(snapshot_id)?.is_none() {
            return Err(SnapshotError::NotFound(snapshot_id));
        }
        if !db.delete_snapshot_part(snapshot_id, part_id)? {
            return Err(SnapshotError::PartNotFound {
                snapshot_id,
                part_id,
            });
        }

        let _ = db.insert_audit_log(
            "snapshot_part_deleted",
            Some(&format!("snapshot {snapshot_id}, part {part_id}")),
            true,
        );
        info!(snapshot_id, part_id, "deleted snapshot part");
        Ok(())
    }

    /// Render a snapshot through the external exporter collaborator.
    pub fn export(
        db: &Database,
        id: i64,
        exporter: &dyn SnapshotExporter,
    ) -> Result<Vec<u8>, SnapshotError> {
        let snapshot = Self::get(db, id)?;
        let parts = db.snapshot_parts(id)?;
        exporter.export(&snapshot, &parts)
    }
}
