//! Typed query helpers for every table in the bommerge database.

use chrono::{DateTime, Utc};
use rusqlite::types::ToSqlOutput;
use rusqlite::{params, Connection, ToSql};
use tracing::debug;

use super::Database;
use crate::errors::DatabaseError;
use crate::models::{MergedSnapshot, NewPartRecord, PartRecord, Source};

// ---------------------------------------------------------------------------
// Row structs and write descriptors
// ---------------------------------------------------------------------------

/// A row from the `audit_log` table.
#[derive(Debug, Clone)]
pub struct AuditLogEntry {
    pub id: i64,
    pub action: String,
    pub details: Option<String>,
    pub success: bool,
    pub created_at: String,
}

/// A typed value for one part column write.
///
/// All part columns are TEXT except `total_weight_kg`, which is REAL.
#[derive(Debug, Clone)]
pub enum PartColumnValue {
    Text(Option<String>),
    Real(Option<f64>),
}

impl ToSql for PartColumnValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Text(v) => v.to_sql(),
            Self::Real(v) => v.to_sql(),
        }
    }
}

/// A single pending column write against one part row.
#[derive(Debug, Clone)]
pub struct PartColumnWrite {
    pub part_id: i64,
    /// Column name; always one of the fixed part columns, never caller input.
    pub column: &'static str,
    pub value: PartColumnValue,
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

/// Shared column list for `parts` and `merged_parts` (identical layouts).
const PART_COLUMNS: &str = "id, source_id, source_name, level, part_code, part_name, spec, \
     version, material, unit_count_per_level, unit_weight_kg, total_weight_kg, \
     part_property, drawing_size, reference_number, purchase_status, process_route, remark";

fn part_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PartRecord> {
    Ok(PartRecord {
        id: row.get(0)?,
        source_id: row.get(1)?,
        source_name: row.get(2)?,
        level: row.get(3)?,
        part_code: row.get(4)?,
        part_name: row.get(5)?,
        spec: row.get(6)?,
        version: row.get(7)?,
        material: row.get(8)?,
        unit_count_per_level: row.get(9)?,
        unit_weight_kg: row.get(10)?,
        total_weight_kg: row.get(11)?,
        part_property: row.get(12)?,
        drawing_size: row.get(13)?,
        reference_number: row.get(14)?,
        purchase_status: row.get(15)?,
        process_route: row.get(16)?,
        remark: row.get(17)?,
    })
}

fn source_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Source> {
    let imported_at: String = row.get(6)?;
    Ok(Source {
        id: row.get(0)?,
        display_name: row.get(1)?,
        original_filename: row.get(2)?,
        file_size: row.get(3)?,
        rows_imported: row.get(4)?,
        status: row.get(5)?,
        imported_at: parse_datetime(&imported_at),
    })
}

fn snapshot_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MergedSnapshot> {
    let source_ids_json: String = row.get(2)?;
    let source_names_json: String = row.get(3)?;
    let created_at: String = row.get(5)?;
    Ok(MergedSnapshot {
        id: row.get(0)?,
        name: row.get(1)?,
        source_ids: serde_json::from_str(&source_ids_json).unwrap_or_default(),
        source_names: serde_json::from_str(&source_names_json).unwrap_or_default(),
        part_count: row.get(4)?,
        created_at: parse_datetime(&created_at),
    })
}

fn insert_part_row(
    conn: &Connection,
    source_id: &str,
    source_name: &str,
    record: &NewPartRecord,
    now: &str,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO parts (source_id, source_name, level, part_code, part_name, spec,
         version, material, unit_count_per_level, unit_weight_kg, total_weight_kg,
         part_property, drawing_size, reference_number, purchase_status, process_route,
         remark, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
        params![
            source_id,
            source_name,
            record.level,
            record.part_code,
            record.part_name,
            record.spec,
            record.version,
            record.material,
            record.unit_count_per_level,
            record.unit_weight_kg,
            record.total_weight_kg,
            record.part_property,
            record.drawing_size,
            record.reference_number,
            record.purchase_status,
            record.process_route,
            record.remark,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

impl Database {
    // -- sources ------------------------------------------------------------

    /// Insert a source row and all of its part rows in one transaction,
    /// preserving the order of `records`.
    pub fn insert_source_with_parts(
        &self,
        source: &Source,
        records: &[NewPartRecord],
    ) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.transaction(|conn| {
            conn.execute(
                "INSERT INTO sources (id, display_name, original_filename, file_size,
                 rows_imported, status, imported_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    source.id,
                    source.display_name,
                    source.original_filename,
                    source.file_size,
                    source.rows_imported,
                    source.status,
                    source.imported_at.to_rfc3339(),
                ],
            )?;
            for record in records {
                insert_part_row(conn, &source.id, &source.display_name, record, &now)?;
            }
            Ok(())
        })?;
        debug!(id = %source.id, parts = records.len(), "inserted source with parts");
        Ok(())
    }

    /// Get a source by stable id.
    pub fn get_source(&self, id: &str) -> Result<Option<Source>, DatabaseError> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT id, display_name, original_filename, file_size, rows_imported,
             status, imported_at FROM sources WHERE id = ?1",
            params![id],
            source_from_row,
        );
        match result {
            Ok(source) => Ok(Some(source)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Find every source whose current display name matches, oldest first.
    ///
    /// Display names are not unique; callers on the legacy name path get
    /// all matches.
    pub fn find_sources_by_name(&self, name: &str) -> Result<Vec<Source>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, display_name, original_filename, file_size, rows_imported,
             status, imported_at FROM sources WHERE display_name = ?1
             ORDER BY imported_at, id",
        )?;
        let sources = stmt
            .query_map(params![name], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    /// List all sources, newest import first.
    pub fn list_sources(&self) -> Result<Vec<Source>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, display_name, original_filename, file_size, rows_imported,
             status, imported_at FROM sources ORDER BY imported_at DESC, id DESC",
        )?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    /// Change a source's display name. The stable id and the source's part
    /// rows are untouched.
    pub fn rename_source(&self, id: &str, new_name: &str) -> Result<(), DatabaseError> {
        let conn = self.conn();
        let changed = conn.execute(
            "UPDATE sources SET display_name = ?1 WHERE id = ?2",
            params![new_name, id],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "source".into(),
                id: id.to_string(),
            });
        }
        debug!(id, new_name, "renamed source");
        Ok(())
    }

    /// Delete a source and all of its part rows in one transaction.
    /// Returns the number of part rows removed.
    pub fn delete_source_and_parts(&self, id: &str) -> Result<usize, DatabaseError> {
        let parts_deleted = self.transaction(|conn| {
            let parts_deleted =
                conn.execute("DELETE FROM parts WHERE source_id = ?1", params![id])?;
            let sources_deleted =
                conn.execute("DELETE FROM sources WHERE id = ?1", params![id])?;
            if sources_deleted == 0 {
                return Err(DatabaseError::NotFound {
                    entity: "source".into(),
                    id: id.to_string(),
                });
            }
            Ok(parts_deleted)
        })?;
        debug!(id, parts_deleted, "deleted source");
        Ok(parts_deleted)
    }

    // -- parts --------------------------------------------------------------

    /// All part rows of one source, in import order.
    pub fn parts_for_source(&self, source_id: &str) -> Result<Vec<PartRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PART_COLUMNS} FROM parts WHERE source_id = ?1 ORDER BY id"
        ))?;
        let parts = stmt
            .query_map(params![source_id], part_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts)
    }

    /// Apply a batch of column writes to part rows in one transaction.
    ///
    /// Returns the number of distinct part rows actually updated. Writes
    /// against row ids that no longer exist update nothing and are counted
    /// as zero.
    pub fn apply_part_writes(&self, writes: &[PartColumnWrite]) -> Result<usize, DatabaseError> {
        if writes.is_empty() {
            return Ok(0);
        }

        // Group writes by target row so each edited record gets one UPDATE.
        let mut by_part: Vec<(i64, Vec<&PartColumnWrite>)> = Vec::new();
        for write in writes {
            match by_part.iter_mut().find(|(id, _)| *id == write.part_id) {
                Some((_, group)) => group.push(write),
                None => by_part.push((write.part_id, vec![write])),
            }
        }

        let updated = self.transaction(|conn| {
            let mut updated = 0usize;
            for (part_id, group) in &by_part {
                let assignments: Vec<String> = group
                    .iter()
                    .enumerate()
                    .map(|(i, w)| format!("{} = ?{}", w.column, i + 1))
                    .collect();
                let sql = format!(
                    "UPDATE parts SET {} WHERE id = ?{}",
                    assignments.join(", "),
                    group.len() + 1
                );
                let mut bound: Vec<&dyn ToSql> =
                    group.iter().map(|w| &w.value as &dyn ToSql).collect();
                bound.push(part_id);
                let changed = conn.execute(&sql, bound.as_slice())?;
                if changed > 0 {
                    updated += 1;
                }
            }
            Ok(updated)
        })?;
        debug!(updated, writes = writes.len(), "applied part writes");
        Ok(updated)
    }

    // -- merged snapshots ---------------------------------------------------

    /// Whether any merged snapshot already uses the given name.
    pub fn snapshot_name_exists(&self, name: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM merged_snapshots WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Insert a snapshot row and a copy of every part record in one
    /// transaction. Returns the new snapshot id.
    pub fn insert_snapshot_with_parts(
        &self,
        name: &str,
        source_ids: &[String],
        source_names: &[String],
        records: &[PartRecord],
    ) -> Result<i64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let ids_json = serde_json::to_string(source_ids).unwrap_or_else(|_| "[]".into());
        let names_json = serde_json::to_string(source_names).unwrap_or_else(|_| "[]".into());

        let snapshot_id = self.transaction(|conn| {
            conn.execute(
                "INSERT INTO merged_snapshots (name, source_names, source_ids, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![name, names_json, ids_json, now],
            )?;
            let snapshot_id = conn.last_insert_rowid();

            for record in records {
                conn.execute(
                    "INSERT INTO merged_parts (snapshot_id, source_id, source_name, level,
                     part_code, part_name, spec, version, material, unit_count_per_level,
                     unit_weight_kg, total_weight_kg, part_property, drawing_size,
                     reference_number, purchase_status, process_route, remark, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                             ?15, ?16, ?17, ?18, ?19)",
                    params![
                        snapshot_id,
                        record.source_id,
                        record.source_name,
                        record.level,
                        record.part_code,
                        record.part_name,
                        record.spec,
                        record.version,
                        record.material,
                        record.unit_count_per_level,
                        record.unit_weight_kg,
                        record.total_weight_kg,
                        record.part_property,
                        record.drawing_size,
                        record.reference_number,
                        record.purchase_status,
                        record.process_route,
                        record.remark,
                        now,
                    ],
                )?;
            }
            Ok(snapshot_id)
        })?;
        debug!(snapshot_id, name, parts = records.len(), "inserted snapshot");
        Ok(snapshot_id)
    }

    /// List all merged snapshots, newest first.
    pub fn list_snapshots(&self) -> Result<Vec<MergedSnapshot>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.name, s.source_ids, s.source_names,
             (SELECT COUNT(*) FROM merged_parts p WHERE p.snapshot_id = s.id),
             s.created_at
             FROM merged_snapshots s ORDER BY s.created_at DESC, s.id DESC",
        )?;
        let snapshots = stmt
            .query_map([], snapshot_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    /// Get a merged snapshot by id.
    pub fn get_snapshot(&self, id: i64) -> Result<Option<MergedSnapshot>, DatabaseError> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT s.id, s.name, s.source_ids, s.source_names,
             (SELECT COUNT(*) FROM merged_parts p WHERE p.snapshot_id = s.id),
             s.created_at
             FROM merged_snapshots s WHERE s.id = ?1",
            params![id],
            snapshot_from_row,
        );
        match result {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All part copies of a merged snapshot, in save order.
    pub fn snapshot_parts(&self, snapshot_id: i64) -> Result<Vec<PartRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PART_COLUMNS} FROM merged_parts WHERE snapshot_id = ?1 ORDER BY id"
        ))?;
        let parts = stmt
            .query_map(params![snapshot_id], part_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts)
    }

    /// Delete a snapshot and all of its part copies in one transaction.
    pub fn delete_snapshot_and_parts(&self, id: i64) -> Result<(), DatabaseError> {
        self.transaction(|conn| {
            conn.execute(
                "DELETE FROM merged_parts WHERE snapshot_id = ?1",
                params![id],
            )?;
            let deleted =
                conn.execute("DELETE FROM merged_snapshots WHERE id = ?1", params![id])?;
            if deleted == 0 {
                return Err(DatabaseError::NotFound {
                    entity: "merged snapshot".into(),
                    id: id.to_string(),
                });
            }
            Ok(())
        })?;
        debug!(id, "deleted snapshot");
        Ok(())
    }

    /// Delete a single part copy belonging to a snapshot. Returns false if
    /// no such part belongs to the snapshot.
    pub fn delete_snapshot_part(
        &self,
        snapshot_id: i64,
        part_id: i64,
    ) -> Result<bool, DatabaseError> {
        let conn = self.conn();
        let deleted = conn.execute(
            "DELETE FROM merged_parts WHERE id = ?1 AND snapshot_id = ?2",
            params![part_id, snapshot_id],
        )?;
        debug!(snapshot_id, part_id, deleted, "deleted snapshot part");
        Ok(deleted > 0)
    }

    // -- audit_log ----------------------------------------------------------

    /// Insert an audit-log entry.
    pub fn insert_audit_log(
        &self,
        action: &str,
        details: Option<&str>,
        success: bool,
    ) -> Result<i64, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO audit_log (action, details, success, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![action, details, success, now],
        )?;
        let id = conn.last_insert_rowid();
        debug!(id, action, "inserted audit_log entry");
        Ok(id)
    }

    /// List recent audit-log entries, newest first.
    pub fn list_audit_log(&self, limit: u32) -> Result<Vec<AuditLogEntry>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, action, details, success, created_at
             FROM audit_log ORDER BY id DESC LIMIT ?1",
        )?;
        let entries = stmt
            .query_map(params![limit], |row| {
                Ok(AuditLogEntry {
                    id: row.get(0)?,
                    action: row.get(1)?,
                    details: row.get(2)?,
                    success: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // -- counts for the status endpoint -------------------------------------

    /// Count registered sources.
    pub fn count_sources(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sources", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count part rows across all sources.
    pub fn count_parts(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM parts", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count merged snapshots.
    pub fn count_snapshots(&self) -> Result<i64, DatabaseError> {
        let conn = self.conn();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM merged_snapshots", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Parse a datetime string, returning Utc::now() as a fallback if parsing fails.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn sample_source(name: &str) -> Source {
        Source {
            id: uuid::Uuid::new_v4().to_string(),
            display_name: name.to_string(),
            original_filename: format!("{name}.xlsx"),
            file_size: 2048,
            rows_imported: 2,
            status: "imported".into(),
            imported_at: Utc::now(),
        }
    }

    fn sample_record(code: &str, spec: &str) -> NewPartRecord {
        NewPartRecord {
            part_code: Some(code.to_string()),
            part_name: Some("bolt".into()),
            spec: Some(spec.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_source_crud() {
        let db = setup_db();
        let source = sample_source("pump-house");
        db.insert_source_with_parts(&source, &[sample_record("P1", "M8"), sample_record("P2", "M10")])
            .unwrap();

        let loaded = db.get_source(&source.id).unwrap().unwrap();
        assert_eq!(loaded.display_name, "pump-house");
        assert_eq!(loaded.rows_imported, 2);

        let parts = db.parts_for_source(&source.id).unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].part_code.as_deref(), Some("P1"));
        assert_eq!(parts[0].source_id, source.id);

        db.rename_source(&source.id, "pump house v2").unwrap();
        let renamed = db.get_source(&source.id).unwrap().unwrap();
        assert_eq!(renamed.display_name, "pump house v2");
        // Identity unchanged.
        assert_eq!(renamed.id, source.id);

        let by_name = db.find_sources_by_name("pump house v2").unwrap();
        assert_eq!(by_name.len(), 1);

        let deleted = db.delete_source_and_parts(&source.id).unwrap();
        assert_eq!(deleted, 2);
        assert!(db.get_source(&source.id).unwrap().is_none());
    }

    #[test]
    fn test_rename_unknown_source() {
        let db = setup_db();
        let result = db.rename_source("no-such-id", "x");
        assert!(matches!(result, Err(DatabaseError::NotFound { .. })));
    }

    #[test]
    fn test_apply_part_writes() {
        let db = setup_db();
        let source = sample_source("a");
        db.insert_source_with_parts(&source, &[sample_record("P1", "M8")])
            .unwrap();
        let part_id = db.parts_for_source(&source.id).unwrap()[0].id;

        let updated = db
            .apply_part_writes(&[
                PartColumnWrite {
                    part_id,
                    column: "spec",
                    value: PartColumnValue::Text(Some("M12".into())),
                },
                PartColumnWrite {
                    part_id,
                    column: "total_weight_kg",
                    value: PartColumnValue::Real(Some(1.25)),
                },
            ])
            .unwrap();
        assert_eq!(updated, 1);

        let part = &db.parts_for_source(&source.id).unwrap()[0];
        assert_eq!(part.spec.as_deref(), Some("M12"));
        assert_eq!(part.total_weight_kg, Some(1.25));
    }

    #[test]
    fn test_apply_part_writes_missing_row() {
        let db = setup_db();
        let updated = db
            .apply_part_writes(&[PartColumnWrite {
                part_id: 999,
                column: "spec",
                value: PartColumnValue::Text(Some("M12".into())),
            }])
            .unwrap();
        assert_eq!(updated, 0);
    }

    #[test]
    fn test_snapshot_crud() {
        let db = setup_db();
        let source = sample_source("a");
        db.insert_source_with_parts(&source, &[sample_record("P1", "M8")])
            .unwrap();
        let parts = db.parts_for_source(&source.id).unwrap();

        assert!(!db.snapshot_name_exists("M1").unwrap());
        let snapshot_id = db
            .insert_snapshot_with_parts(
                "M1",
                &[source.id.clone()],
                &["a".to_string()],
                &parts,
            )
            .unwrap();
        assert!(db.snapshot_name_exists("M1").unwrap());

        let listed = db.list_snapshots().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "M1");
        assert_eq!(listed[0].part_count, 1);
        assert_eq!(listed[0].source_ids, vec![source.id.clone()]);

        let copies = db.snapshot_parts(snapshot_id).unwrap();
        assert_eq!(copies.len(), 1);
        assert_eq!(copies[0].part_code.as_deref(), Some("P1"));

        db.delete_snapshot_and_parts(snapshot_id).unwrap();
        assert!(db.get_snapshot(snapshot_id).unwrap().is_none());
        assert!(db.snapshot_parts(snapshot_id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_snapshot_part_scoped_to_snapshot() {
        let db = setup_db();
        let source = sample_source("a");
        db.insert_source_with_parts(
            &source,
            &[sample_record("P1", "M8"), sample_record("P2", "M10")],
        )
        .unwrap();
        let parts = db.parts_for_source(&source.id).unwrap();
        let s1 = db
            .insert_snapshot_with_parts("M1", &[source.id.clone()], &["a".into()], &parts)
            .unwrap();
        let s2 = db
            .insert_snapshot_with_parts("M2", &[source.id.clone()], &["a".into()], &parts)
            .unwrap();

        let victim = db.snapshot_parts(s1).unwrap()[0].id;
        // Wrong snapshot id: refused.
        assert!(!db.delete_snapshot_part(s2, victim).unwrap());
        assert!(db.delete_snapshot_part(s1, victim).unwrap());

        assert_eq!(db.snapshot_parts(s1).unwrap().len(), 1);
        assert_eq!(db.snapshot_parts(s2).unwrap().len(), 2);
    }

    #[test]
    fn test_audit_log() {
        let db = setup_db();
        db.insert_audit_log("snapshot_saved", Some("M1, 2 parts"), true)
            .unwrap();
        db.insert_audit_log("snapshot_save_failed", Some("duplicate name"), false)
            .unwrap();

        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        // Newest first.
        assert_eq!(entries[0].action, "snapshot_save_failed");
        assert!(!entries[0].success);
        assert!(entries[1].success);
    }

    #[test]
    fn test_counts() {
        let db = setup_db();
        assert_eq!(db.count_sources().unwrap(), 0);
        let source = sample_source("a");
        db.insert_source_with_parts(&source, &[sample_record("P1", "M8")])
            .unwrap();
        assert_eq!(db.count_sources().unwrap(), 1);
        assert_eq!(db.count_parts().unwrap(), 1);
        assert_eq!(db.count_snapshots().unwrap(), 0);
    }
}
