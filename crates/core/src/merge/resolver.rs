//! Merge resolver: fan-in of part records from a selection of sources.
//!
//! Merging is a pure set union over the registry snapshot: every record of
//! every selected source is carried into the working set, in selection
//! order. Exact duplicates are deliberately kept; deduplication is not an
//! identity operation here, it simply shows up downstream as a
//! conflict-free group of size > 1.

use tracing::{info, warn};

use crate::db::Database;
use crate::errors::{MergeError, RegistryError};
use crate::models::{PartRecord, SourceSelector};
use crate::registry::SourceRegistry;

/// Stateless merge operations.
pub struct MergeResolver;

impl MergeResolver {
    /// Merge the part records of all sources named by `selector`.
    ///
    /// Fails with [`MergeError::EmptySelection`] when the selector names no
    /// sources. Otherwise returns the concatenation of each source's
    /// records — no drops, no additions — with sources appended in the
    /// order given and each source's records in import order. Pure read;
    /// no side effects.
    pub fn merge(db: &Database, selector: &SourceSelector) -> Result<Vec<PartRecord>, MergeError> {
        if selector.is_empty() {
            return Err(MergeError::EmptySelection);
        }

        let records = match selector {
            SourceSelector::ById(ids) => SourceRegistry::resolve_by_ids(db, ids)?,
            SourceSelector::ByName(names) => SourceRegistry::resolve_by_names(db, names)?,
        };

        info!(
            sources = selector.len(),
            records = records.len(),
            "merged part records"
        );
        Ok(records)
    }

    /// Merge by stable ids, falling back to display names when an id no
    /// longer resolves.
    ///
    /// The fallback exists for legacy lineage that predates stable ids.
    /// When the name-based attempt fails too, the original id-based error
    /// is the one surfaced: it names the identity the caller actually
    /// asked for.
    pub fn merge_with_fallback(
        db: &Database,
        ids: &[String],
        names: &[String],
    ) -> Result<Vec<PartRecord>, MergeError> {
        if ids.is_empty() {
            return Self::merge(db, &SourceSelector::ByName(names.to_vec()));
        }

        let by_id = Self::merge(db, &SourceSelector::ById(ids.to_vec()));
        let original = match by_id {
            Ok(records) => return Ok(records),
            // Only unresolvable identities trigger the fallback; storage
            // errors propagate immediately.
            Err(MergeError::Registry(RegistryError::UnknownSource(id))) => {
                MergeError::Registry(RegistryError::UnknownSource(id))
            }
            Err(other) => return Err(other),
        };

        if names.is_empty() {
            return Err(original);
        }

        warn!(error = %original, "id-based merge failed, retrying by source name");
        match Self::merge(db, &SourceSelector::ByName(names.to_vec())) {
            Ok(records) => Ok(records),
            Err(_) => Err(original),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPartRecord;

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

    fn register(db: &Database, name: &str, codes: &[&str]) -> String {
        let records = codes.iter().map(|c| record(c)).collect();
        SourceRegistry::register(db, name, &format!("{name}.xlsx"), 100, records)
            .unwrap()
            .id
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let db = setup_db();
        let result = MergeResolver::merge(&db, &SourceSelector::ById(vec![]));
        assert!(matches!(result, Err(MergeError::EmptySelection)));

        let result = MergeResolver::merge(&db, &SourceSelector::ByName(vec![]));
        assert!(matches!(result, Err(MergeError::EmptySelection)));
    }

    #[test]
    fn test_merge_is_exact_concatenation() {
        let db = setup_db();
        let a = register(&db, "a", &["P1", "P2"]);
        let b = register(&db, "b", &["P2", "P3"]);

        let records =
            MergeResolver::merge(&db, &SourceSelector::ById(vec![a.clone(), b.clone()])).unwrap();
        // Sum of both sources' counts: the duplicate P2 is kept.
        assert_eq!(records.len(), 4);
        let codes: Vec<_> = records
            .iter()
            .map(|r| r.part_code.clone().unwrap())
            .collect();
        assert_eq!(codes, vec!["P1", "P2", "P2", "P3"]);
    }

    #[test]
    fn test_merge_same_source_twice_doubles_records() {
        let db = setup_db();
        let a = register(&db, "a", &["P1"]);
        let records =
            MergeResolver::merge(&db, &SourceSelector::ById(vec![a.clone(), a])).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_fallback_to_names() {
        let db = setup_db();
        register(&db, "legacy-line", &["P1", "P2"]);

        // The recorded id no longer resolves, but the name does.
        let records = MergeResolver::merge_with_fallback(
            &db,
            &["gone-id".to_string()],
            &["legacy-line".to_string()],
        )
        .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_fallback_failure_surfaces_original_error() {
        let db = setup_db();
        let result = MergeResolver::merge_with_fallback(
            &db,
            &["gone-id".to_string()],
            &["gone-name".to_string()],
        );
        // The id-based error wins, not the name-based one.
        assert!(matches!(
            result,
            Err(MergeError::Registry(RegistryError::UnknownSource(ref id))) if id == "gone-id"
        ));
    }

    #[test]
    fn test_no_fallback_without_names() {
        let db = setup_db();
        let result = MergeResolver::merge_with_fallback(&db, &["gone-id".to_string()], &[]);
        assert!(matches!(
            result,
            Err(MergeError::Registry(RegistryError::UnknownSource(_)))
        ));
    }
}
