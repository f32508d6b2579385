//! Database schema definitions and migration runner.
//!
//! Migrations are simple SQL strings applied in order. The current schema
//! version is tracked in the SQLite `user_version` pragma.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::DatabaseError;

/// All migrations, in order. Each entry is `(version, description, sql)`.
/// Versions start at 1.
static MIGRATIONS: &[(u32, &str, &str)] = &[
    (
        1,
        "initial schema",
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id                TEXT PRIMARY KEY,
            display_name      TEXT    NOT NULL,
            original_filename TEXT    NOT NULL DEFAULT '',
            file_size         INTEGER NOT NULL DEFAULT 0,
            rows_imported     INTEGER NOT NULL DEFAULT 0,
            status            TEXT    NOT NULL DEFAULT 'imported',
            imported_at       TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sources_display_name ON sources (display_name);

        CREATE TABLE IF NOT EXISTS parts (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            source_id            TEXT NOT NULL REFERENCES sources (id),
            source_name          TEXT NOT NULL DEFAULT '',
            level                TEXT,
            part_code            TEXT,
            part_name            TEXT,
            spec                 TEXT,
            version              TEXT,
            material             TEXT,
            unit_count_per_level TEXT,
            unit_weight_kg       TEXT,
            total_weight_kg      REAL,
            part_property        TEXT,
            drawing_size         TEXT,
            reference_number     TEXT,
            purchase_status      TEXT,
            process_route        TEXT,
            remark               TEXT,
            created_at           TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_parts_source_id ON parts (source_id);
        CREATE INDEX IF NOT EXISTS idx_parts_part_code ON parts (part_code);

        CREATE TABLE IF NOT EXISTS merged_snapshots (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            name         TEXT NOT NULL,
            source_names TEXT NOT NULL DEFAULT '[]',
            created_at   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_merged_snapshots_name ON merged_snapshots (name);

        CREATE TABLE IF NOT EXISTS merged_parts (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            snapshot_id          INTEGER NOT NULL REFERENCES merged_snapshots (id),
            source_id            TEXT NOT NULL DEFAULT '',
            source_name          TEXT NOT NULL DEFAULT '',
            level                TEXT,
            part_code            TEXT,
            part_name            TEXT,
            spec                 TEXT,
            version              TEXT,
            material             TEXT,
            unit_count_per_level TEXT,
            unit_weight_kg       TEXT,
            total_weight_kg      REAL,
            part_property        TEXT,
            drawing_size         TEXT,
            reference_number     TEXT,
            purchase_status      TEXT,
            process_route        TEXT,
            remark               TEXT,
            created_at           TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_merged_parts_snapshot_id ON merged_parts (snapshot_id);

        CREATE TABLE IF NOT EXISTS audit_log (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            action      TEXT NOT NULL,
            details     TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_audit_log_created_at ON audit_log (created_at);
        CREATE INDEX IF NOT EXISTS idx_audit_log_action ON audit_log (action);
        "#,
    ),
    (
        2,
        "record stable source ids on merged snapshots",
        r#"
        ALTER TABLE merged_snapshots ADD COLUMN source_ids TEXT NOT NULL DEFAULT '[]';
        "#,
    ),
    (
        3,
        "add success column to audit_log",
        r#"
        ALTER TABLE audit_log ADD COLUMN success INTEGER NOT NULL DEFAULT 1;
        CREATE INDEX IF NOT EXISTS idx_audit_log_success ON audit_log (success);
        "#,
    ),
];

/// Run all pending migrations against `conn`.
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_schema_version(conn)?;
    info!(
        current_version,
        target_version = MIGRATIONS.last().map(|m| m.0).unwrap_or(0),
        "checking database migrations"
    );

    for &(version, description, sql) in MIGRATIONS {
        if version > current_version {
            info!(version, description, "applying migration");
            conn.execute_batch(sql)
                .map_err(|e| DatabaseError::MigrationFailed {
                    version,
                    detail: e.to_string(),
                })?;
            set_schema_version(conn, version)?;
            debug!(version, "migration applied successfully");
        }
    }

    Ok(())
}

/// Read the current schema version from the SQLite `user_version` pragma.
fn get_schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version via the SQLite `user_version` pragma.
fn set_schema_version(conn: &Connection, version: u32) -> Result<(), DatabaseError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_run_idempotently() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 3);
    }

    #[test]
    fn test_tables_created() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .filter_map(|r| r.ok())
                .collect()
        };

        assert!(tables.contains(&"sources".to_string()));
        assert!(tables.contains(&"parts".to_string()));
        assert!(tables.contains(&"merged_snapshots".to_string()));
        assert!(tables.contains(&"merged_parts".to_string()));
        assert!(tables.contains(&"audit_log".to_string()));
    }

    #[test]
    fn test_legacy_snapshot_rows_default_to_empty_id_lineage() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO merged_snapshots (name, source_names, created_at)
             VALUES ('legacy', '[\"old name\"]', '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        let source_ids: String = conn
            .query_row(
                "SELECT source_ids FROM merged_snapshots WHERE name = 'legacy'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(source_ids, "[]");
    }
}
