//! Source registry: stable identity and part-record ownership for every
//! imported file.
//!
//! A source's stable id is assigned exactly once at registration. The
//! display name is the only mutable attribute; renaming never affects the
//! id, the source's part rows, or any already-persisted merged snapshot.

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::Database;
use crate::errors::RegistryError;
use crate::models::{NewPartRecord, PartRecord, Source};

/// Stateless source-registry operations.
///
/// All methods take a [`Database`] reference; the registry itself holds no
/// state.
pub struct SourceRegistry;

impl SourceRegistry {
    /// Register a new source from an already-parsed upload.
    ///
    /// Spreadsheet parsing happens in an external collaborator; this
    /// boundary receives the parsed record sequence and assigns the stable
    /// id. An empty `display_name` defaults to the original filename with
    /// its extension stripped.
    pub fn register(
        db: &Database,
        display_name: &str,
        original_filename: &str,
        file_size: i64,
        records: Vec<NewPartRecord>,
    ) -> Result<Source, RegistryError> {
        let display_name = if display_name.trim().is_empty() {
            filename_stem(original_filename)
        } else {
            display_name.trim().to_string()
        };

        let source = Source {
            id: Uuid::new_v4().to_string(),
            display_name,
            original_filename: original_filename.to_string(),
            file_size,
            rows_imported: records.len() as i64,
            status: "imported".into(),
            imported_at: Utc::now(),
        };

        db.insert_source_with_parts(&source, &records)?;

        let _ = db.insert_audit_log(
            "source_registered",
            Some(&format!(
                "'{}' ({}, {} rows)",
                source.display_name, source.id, source.rows_imported
            )),
            true,
        );

        info!(
            id = %source.id,
            name = %source.display_name,
            rows = source.rows_imported,
            "registered source"
        );
        Ok(source)
    }

    /// Resolve a list of source ids into their part records.
    ///
    /// Fails with [`RegistryError::UnknownSource`] before returning any
    /// records if any id is unregistered; a failed resolution never yields
    /// a partial record set. Records are returned source by source in the
    /// order given, each source's records in import order.
    pub fn resolve_by_ids(
        db: &Database,
        ids: &[String],
    ) -> Result<Vec<PartRecord>, RegistryError> {
        let mut all_parts = Vec::new();
        for id in ids {
            if db.get_source(id)?.is_none() {
                return Err(RegistryError::UnknownSource(id.clone()));
            }
            all_parts.extend(db.parts_for_source(id)?);
        }
        debug!(sources = ids.len(), records = all_parts.len(), "resolved sources by id");
        Ok(all_parts)
    }

    /// Resolve a list of display names into their part records.
    ///
    /// Legacy path for snapshots that recorded only names. Display names
    /// are not unique: a name matching several sources yields the records
    /// of all of them, oldest import first. Which of several same-named
    /// sources a caller actually meant cannot be recovered here.
    pub fn resolve_by_names(
        db: &Database,
        names: &[String],
    ) -> Result<Vec<PartRecord>, RegistryError> {
        let mut all_parts = Vec::new();
        for name in names {
            let sources = db.find_sources_by_name(name)?;
            if sources.is_empty() {
                return Err(RegistryError::UnknownSourceName(name.clone()));
            }
            for source in &sources {
                all_parts.extend(db.parts_for_source(&source.id)?);
            }
        }
        debug!(names = names.len(), records = all_parts.len(), "resolved sources by name");
        Ok(all_parts)
    }

    /// Change a source's display name and return the updated source.
    pub fn rename(db: &Database, id: &str, new_name: &str) -> Result<Source, RegistryError> {
        db.rename_source(id, new_name).map_err(|e| match e {
            crate::errors::DatabaseError::NotFound { .. } => {
                RegistryError::UnknownSource(id.to_string())
            }
            other => other.into(),
        })?;

        let _ = db.insert_audit_log(
            "source_renamed",
            Some(&format!("{id} -> '{new_name}'")),
            true,
        );

        info!(id, new_name, "renamed source");
        // The row was just updated, so it must exist.
        db.get_source(id)?
            .ok_or_else(|| RegistryError::UnknownSource(id.to_string()))
    }

    /// Delete a source and its part rows. Part copies held by merged
    /// snapshots are unaffected. Returns the number of part rows removed.
    pub fn delete(db: &Database, id: &str) -> Result<usize, RegistryError> {
        let deleted = db.delete_source_and_parts(id).map_err(|e| match e {
            crate::errors::DatabaseError::NotFound { .. } => {
                RegistryError::UnknownSource(id.to_string())
            }
            other => other.into(),
        })?;

        let _ = db.insert_audit_log(
            "source_deleted",
            Some(&format!("{id} ({deleted} parts)")),
            true,
        );

        info!(id, parts_deleted = deleted, "deleted source");
        Ok(deleted)
    }

    /// List all registered sources, newest import first.
    pub fn list(db: &Database) -> Result<Vec<Source>, RegistryError> {
        Ok(db.list_sources()?)
    }

    /// Get a single source by stable id.
    pub fn get(db: &Database, id: &str) -> Result<Source, RegistryError> {
        db.get_source(id)?
            .ok_or_else(|| RegistryError::UnknownSource(id.to_string()))
    }
}

/// Filename with the final extension stripped: `s500.xlsx` -> `s500`.
fn filename_stem(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem.to_string(),
        _ => filename.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn record(code: &str) -> NewPartRecord {
        NewPartRecord {
            part_code: Some(code.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_register_assigns_stable_id() {
        let db = setup_db();
        let a = SourceRegistry::register(&db, "line-a", "a.xlsx", 100, vec![record("P1")]).unwrap();
        let b = SourceRegistry::register(&db, "line-b", "b.xlsx", 100, vec![record("P2")]).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.rows_imported, 1);
        assert_eq!(a.status, "imported");
    }

    #[test]
    fn test_register_defaults_name_from_filename() {
        let db = setup_db();
        let source =
            SourceRegistry::register(&db, "  ", "s500.xlsx", 100, vec![record("P1")]).unwrap();
        assert_eq!(source.display_name, "s500");
    }

    #[test]
    fn test_resolve_by_ids_order_and_failure() {
        let db = setup_db();
        let a = SourceRegistry::register(
            &db,
            "a",
            "a.xlsx",
            100,
            vec![record("P1"), record("P2")],
        )
        .unwrap();
        let b = SourceRegistry::register(&db, "b", "b.xlsx", 100, vec![record("P3")]).unwrap();

        // Order of ids controls concatenation order.
        let parts =
            SourceRegistry::resolve_by_ids(&db, &[b.id.clone(), a.id.clone()]).unwrap();
        let codes: Vec<_> = parts.iter().map(|p| p.part_code.clone().unwrap()).collect();
        assert_eq!(codes, vec!["P3", "P1", "P2"]);

        let err = SourceRegistry::resolve_by_ids(&db, &[a.id.clone(), "missing".into()]);
        assert!(matches!(err, Err(RegistryError::UnknownSource(ref id)) if id == "missing"));
    }

    #[test]
    fn test_resolve_by_names_returns_all_same_named_sources() {
        let db = setup_db();
        SourceRegistry::register(&db, "dup", "one.xlsx", 100, vec![record("P1")]).unwrap();
        SourceRegistry::register(&db, "dup", "two.xlsx", 100, vec![record("P2")]).unwrap();

        let parts = SourceRegistry::resolve_by_names(&db, &["dup".to_string()]).unwrap();
        assert_eq!(parts.len(), 2);

        let err = SourceRegistry::resolve_by_names(&db, &["nope".to_string()]);
        assert!(matches!(err, Err(RegistryError::UnknownSourceName(_))));
    }

    #[test]
    fn test_rename_keeps_identity() {
        let db = setup_db();
        let source =
            SourceRegistry::register(&db, "old", "a.xlsx", 100, vec![record("P1")]).unwrap();
        let renamed = SourceRegistry::rename(&db, &source.id, "new").unwrap();
        assert_eq!(renamed.id, source.id);
        assert_eq!(renamed.display_name, "new");

        // Name lookups follow the current display name.
        assert!(SourceRegistry::resolve_by_names(&db, &["old".to_string()]).is_err());
        assert_eq!(
            SourceRegistry::resolve_by_names(&db, &["new".to_string()])
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_delete_unknown_source() {
        let db = setup_db();
        let result = SourceRegistry::delete(&db, "missing");
        assert!(matches!(result, Err(RegistryError::UnknownSource(_))));
    }
}
