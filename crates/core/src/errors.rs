//! Error types for the bommerge core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Source registry errors
// ---------------------------------------------------------------------------

/// Errors from the source registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No source is registered under the given stable id.
    #[error("unknown source id: {0}")]
    UnknownSource(String),

    /// No source is registered under the given display name (legacy lookup).
    #[error("unknown source name: {0}")]
    UnknownSourceName(String),

    /// Database error during a registry operation.
    #[error("registry database error: {0}")]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors from the merge resolver and edit overlay.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The caller asked to merge an empty selection of sources.
    #[error("empty source selection: at least one source is required")]
    EmptySelection,

    /// Source resolution failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Database error while committing edits.
    #[error("merge database error: {0}")]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Snapshot errors
// ---------------------------------------------------------------------------

/// Errors from the merged-snapshot store.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Another snapshot already uses the requested name.
    #[error("a merged snapshot named '{0}' already exists")]
    DuplicateName(String),

    /// Refusing to save a snapshot with no part records.
    #[error("cannot save a merged snapshot with an empty record set")]
    EmptyRecordSet,

    /// The requested snapshot id does not exist.
    #[error("merged snapshot not found: {0}")]
    NotFound(i64),

    /// The requested part does not belong to the snapshot.
    #[error("part {part_id} not found in merged snapshot {snapshot_id}")]
    PartNotFound {
        snapshot_id: i64,
        part_id: i64,
    },

    /// The external exporter collaborator failed.
    #[error("snapshot export failed: {0}")]
    ExportFailed(String),

    /// Database error while persisting or reading a snapshot.
    #[error("snapshot database error: {0}")]
    Database(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// A migration failed.
    #[error("database migration failed (version {version}): {detail}")]
    MigrationFailed {
        version: u32,
        detail: String,
    },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = RegistryError::UnknownSource("f7a3".into());
        assert_eq!(err.to_string(), "unknown source id: f7a3");

        let err = MergeError::EmptySelection;
        assert!(err.to_string().contains("at least one source"));

        let err = SnapshotError::DuplicateName("M1".into());
        assert!(err.to_string().contains("'M1'"));

        let err = SnapshotError::PartNotFound {
            snapshot_id: 3,
            part_id: 42,
        };
        assert_eq!(err.to_string(), "part 42 not found in merged snapshot 3");
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let reg_err = RegistryError::UnknownSourceName("pump-house".into());
        let core_err: CoreError = reg_err.into();
        assert!(matches!(core_err, CoreError::Registry(_)));

        let db_err = DatabaseError::NotFound {
            entity: "source".into(),
            id: "abc".into(),
        };
        let core_err: CoreError = CoreError::Database(db_err);
        assert!(matches!(core_err, CoreError::Database(_)));
    }
}
