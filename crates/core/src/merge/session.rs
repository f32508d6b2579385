//! Request-scoped merge session.
//!
//! A [`MergeSession`] is an explicit value object carrying one caller's
//! selection, resolved working set, and pending edit overlay. It is
//! constructed per invocation and passed through the API — there is no
//! ambient or server-held merge state. Two sessions over the same sources
//! are fully independent until commit, where edits are last-write-wins.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::db::Database;
use crate::errors::{MergeError, RegistryError};
use crate::merge::detector::{ConflictDetector, ConflictMap};
use crate::merge::overlay::{EditOverlay, FieldEdit};
use crate::merge::resolver::MergeResolver;
use crate::models::{PartRecord, SourceSelector};

/// Result of committing a session's pending edits.
#[derive(Debug, Clone)]
pub struct CommitOutcome {
    /// Number of part rows actually written.
    pub updated_count: usize,
    /// The working set re-read after the writes.
    pub records: Vec<PartRecord>,
    /// Conflicts re-detected over the full working set, edited and
    /// unedited records alike.
    pub conflicts: ConflictMap,
}

/// One caller's merge-and-edit workspace.
pub struct MergeSession {
    selector: SourceSelector,
    records: Vec<PartRecord>,
    overlay: EditOverlay,
}

impl MergeSession {
    /// Resolve `selector` into a working set and open a session over it.
    pub fn open(db: &Database, selector: SourceSelector) -> Result<Self, MergeError> {
        let records = MergeResolver::merge(db, &selector)?;
        debug!(records = records.len(), "opened merge session");
        Ok(Self {
            selector,
            records,
            overlay: EditOverlay::new(),
        })
    }

    /// Open a session by stable ids, falling back to display names when an
    /// id no longer resolves. The session keeps whichever selector
    /// actually succeeded, so later re-reads use the same identity.
    pub fn open_with_fallback(
        db: &Database,
        ids: &[String],
        names: &[String],
    ) -> Result<Self, MergeError> {
        if ids.is_empty() {
            return Self::open(db, SourceSelector::ByName(names.to_vec()));
        }

        let original = match Self::open(db, SourceSelector::ById(ids.to_vec())) {
            Ok(session) => return Ok(session),
            Err(MergeError::Registry(RegistryError::UnknownSource(id))) => {
                MergeError::Registry(RegistryError::UnknownSource(id))
            }
            Err(other) => return Err(other),
        };

        if names.is_empty() {
            return Err(original);
        }
        match Self::open(db, SourceSelector::ByName(names.to_vec())) {
            Ok(session) => Ok(session),
            Err(_) => Err(original),
        }
    }

    /// The selector this session resolved with.
    pub fn selector(&self) -> &SourceSelector {
        &self.selector
    }

    /// The current working set.
    pub fn records(&self) -> &[PartRecord] {
        &self.records
    }

    /// Detect conflicts over the current working set. Recomputed on every
    /// call; the result is never cached or stored.
    pub fn conflicts(&self) -> ConflictMap {
        ConflictDetector::detect(&self.records)
    }

    /// Stage one edit. Returns false for edits addressing a non-editable
    /// field (a no-op by design, not an error).
    pub fn stage(&mut self, edit: &FieldEdit) -> bool {
        self.overlay
            .set_field_by_name(edit.part_id, &edit.field, edit.value.clone())
    }

    /// Stage a batch of edits; returns how many were accepted.
    pub fn stage_all(&mut self, edits: &[FieldEdit]) -> usize {
        edits.iter().filter(|e| self.stage(e)).count()
    }

    /// Number of staged (record, field) pairs.
    pub fn pending_edits(&self) -> usize {
        self.overlay.pending_count()
    }

    /// Drop all staged edits without persisting anything.
    pub fn discard_edits(&mut self) {
        self.overlay.discard();
    }

    /// Apply all staged edits to their target rows, then re-read the
    /// working set and re-run conflict detection over all of it.
    ///
    /// Only the edited rows are written, in one transaction. The overlay
    /// is empty afterwards, whether or not anything changed. Edits
    /// addressing rows outside the working set are skipped.
    pub fn commit(&mut self, db: &Database) -> Result<CommitOutcome, MergeError> {
        let known_ids: BTreeSet<i64> = self.records.iter().map(|r| r.id).collect();
        let writes = self.overlay.take_writes(&known_ids);
        let updated_count = db.apply_part_writes(&writes)?;

        if updated_count > 0 {
            let _ = db.insert_audit_log(
                "parts_updated",
                Some(&format!("{updated_count} records")),
                true,
            );
        }

        self.records = MergeResolver::merge(db, &self.selector)?;
        let conflicts = ConflictDetector::detect(&self.records);

        info!(
            updated = updated_count,
            records = self.records.len(),
            conflicted_codes = conflicts.len(),
            "committed session edits"
        );
        Ok(CommitOutcome {
            updated_count,
            records: self.records.clone(),
            conflicts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPartRecord;
    use crate::registry::SourceRegistry;

    fn setup_db() -> Database {
        let db = Database::in_memory().unwrap();
        db.initialize().unwrap();
        db
    }

    fn record(code: &str, spec: &str) -> NewPartRecord {
        NewPartRecord {
            part_code: Some(code.to_string()),
            spec: Some(spec.to_string()),
            ..Default::default()
        }
    }

    fn two_source_session(db: &Database) -> MergeSession {
        let a = SourceRegistry::register(db, "a", "a.xlsx", 100, vec![record("P1", "X")])
            .unwrap()
            .id;
        let b = SourceRegistry::register(db, "b", "b.xlsx", 100, vec![record("P1", "Y")])
            .unwrap()
            .id;
        MergeSession::open(db, SourceSelector::ById(vec![a, b])).unwrap()
    }

    #[test]
    fn test_open_resolves_and_detects() {
        let db = setup_db();
        let session = two_source_session(&db);
        assert_eq!(session.records().len(), 2);
        assert_eq!(session.conflicts().get("P1"), Some(&vec!["spec"]));
    }

    #[test]
    fn test_commit_resolves_conflict() {
        let db = setup_db();
        let mut session = two_source_session(&db);
        let second = session.records()[1].id;

        assert!(session.stage(&FieldEdit {
            part_id: second,
            field: "spec".into(),
            value: "X".into(),
        }));
        let outcome = session.commit(&db).unwrap();
        assert_eq!(outcome.updated_count, 1);
        assert!(outcome.conflicts.is_empty());
        assert_eq!(outcome.records.len(), 2);
        assert_eq!(session.pending_edits(), 0);
    }

    #[test]
    fn test_commit_is_idempotent() {
        let db = setup_db();
        let mut session = two_source_session(&db);
        let second = session.records()[1].id;

        let edit = FieldEdit {
            part_id: second,
            field: "spec".into(),
            value: "X".into(),
        };
        session.stage(&edit);
        let first = session.commit(&db).unwrap();

        session.stage(&edit);
        let again = session.commit(&db).unwrap();
        // Committing the same edit twice yields the same conflict map.
        assert_eq!(first.conflicts, again.conflicts);
        assert_eq!(again.records.len(), first.records.len());
    }

    #[test]
    fn test_identity_edit_is_noop() {
        let db = setup_db();
        let mut session = two_source_session(&db);
        let first = session.records()[0].id;

        assert!(!session.stage(&FieldEdit {
            part_id: first,
            field: "part_code".into(),
            value: "P2".into(),
        }));
        let outcome = session.commit(&db).unwrap();
        assert_eq!(outcome.updated_count, 0);
        // Grouping is unchanged, so the original conflict stands.
        assert_eq!(outcome.conflicts.get("P1"), Some(&vec!["spec"]));
    }

    #[test]
    fn test_discard_leaves_rows_untouched() {
        let db = setup_db();
        let mut session = two_source_session(&db);
        let first = session.records()[0].id;

        session.stage(&FieldEdit {
            part_id: first,
            field: "spec".into(),
            value: "Z".into(),
        });
        session.discard_edits();
        let outcome = session.commit(&db).unwrap();
        assert_eq!(outcome.updated_count, 0);
        assert_eq!(outcome.records[0].spec.as_deref(), Some("X"));
    }

    #[test]
    fn test_commit_reruns_detection_over_unedited_records() {
        let db = setup_db();
        let mut session = two_source_session(&db);
        let first = session.records()[0].id;

        // Editing the first record to match the second clears the conflict
        // even though the second record was never edited.
        session.stage(&FieldEdit {
            part_id: first,
            field: "spec".into(),
            value: "Y".into(),
        });
        let outcome = session.commit(&db).unwrap();
        assert!(outcome.conflicts.is_empty());
    }
}
