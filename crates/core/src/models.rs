//! Domain model types used throughout bommerge.
//!
//! These types bridge the merge engine, database layer, and web API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Part records
// ---------------------------------------------------------------------------

/// One row of a bill of materials, as stored in the parts table.
///
/// Identity for conflict grouping is `part_code` alone; records with a
/// blank code are never grouped. `level` and the weight/count columns are
/// kept as text because independently imported spreadsheets disagree on
/// numeric representation ("1" vs "1.0"); normalization happens at
/// comparison time, not at rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartRecord {
    /// Row id. For working-set records this is the parts-table row id; for
    /// snapshot copies it is the merged-parts row id.
    pub id: i64,
    /// Stable id of the owning source.
    pub source_id: String,
    /// Display name of the owning source at import time.
    pub source_name: String,
    pub level: Option<String>,
    pub part_code: Option<String>,
    pub part_name: Option<String>,
    pub spec: Option<String>,
    pub version: Option<String>,
    pub material: Option<String>,
    pub unit_count_per_level: Option<String>,
    pub unit_weight_kg: Option<String>,
    pub total_weight_kg: Option<f64>,
    pub part_property: Option<String>,
    pub drawing_size: Option<String>,
    pub reference_number: Option<String>,
    pub purchase_status: Option<String>,
    pub process_route: Option<String>,
    pub remark: Option<String>,
}

/// A part record as accepted at the source-registration boundary.
///
/// The field set is closed: payloads carrying any field outside this list
/// are rejected during deserialization. Source attribution and row ids are
/// assigned by the registry, never by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewPartRecord {
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub part_code: Option<String>,
    #[serde(default)]
    pub part_name: Option<String>,
    #[serde(default)]
    pub spec: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub unit_count_per_level: Option<String>,
    #[serde(default)]
    pub unit_weight_kg: Option<String>,
    #[serde(default)]
    pub total_weight_kg: Option<f64>,
    #[serde(default)]
    pub part_property: Option<String>,
    #[serde(default)]
    pub drawing_size: Option<String>,
    #[serde(default)]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub purchase_status: Option<String>,
    #[serde(default)]
    pub process_route: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One imported spreadsheet.
///
/// The `id` is assigned once at registration and never reused or
/// reassigned; `display_name` may change at any time without affecting
/// identity or any already-persisted snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    /// Stable opaque identifier (UUID v4 string).
    pub id: String,
    /// Human-editable display name.
    pub display_name: String,
    /// Filename of the uploaded spreadsheet.
    pub original_filename: String,
    /// Size of the uploaded file in bytes.
    pub file_size: i64,
    /// Number of part rows produced by the import.
    pub rows_imported: i64,
    /// Import status as reported by the upload collaborator. The registry
    /// only ever registers fully-imported sources, so this is normally
    /// `"imported"`.
    pub status: String,
    pub imported_at: DateTime<Utc>,
}

/// How a merge request identifies its contributing sources.
///
/// Stable ids are the preferred identity; display names exist only for
/// legacy snapshots that recorded nothing else. The resolver tries the
/// variants in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSelector {
    /// Select sources by stable id.
    ById(Vec<String>),
    /// Select sources by display name (legacy fallback; ambiguous when two
    /// sources share a name).
    ByName(Vec<String>),
}

impl SourceSelector {
    /// True when the selection names no sources at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::ById(ids) => ids.is_empty(),
            Self::ByName(names) => names.is_empty(),
        }
    }

    /// Number of sources named by the selection.
    pub fn len(&self) -> usize {
        match self {
            Self::ById(ids) => ids.len(),
            Self::ByName(names) => names.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merged snapshots
// ---------------------------------------------------------------------------

/// A named, persisted merge result.
///
/// Snapshots are point-in-time materializations: the part rows are copies
/// taken at save time and are never re-derived from the contributing
/// sources. `source_ids` is the preferred lineage; `source_names` holds the
/// display names in effect at save time and is the only lineage legacy
/// rows have.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedSnapshot {
    pub id: i64,
    pub name: String,
    /// Stable ids of the contributing sources. Empty on rows saved before
    /// id lineage was recorded.
    pub source_ids: Vec<String>,
    /// Display names of the contributing sources at save time.
    pub source_names: Vec<String>,
    /// Number of part copies held by the snapshot.
    pub part_count: i64,
    pub created_at: DateTime<Utc>,
}

impl MergedSnapshot {
    /// The selector a lineage lookup should use: stable ids when the
    /// snapshot recorded them, display names otherwise.
    pub fn lineage(&self) -> SourceSelector {
        if self.source_ids.is_empty() {
            SourceSelector::ByName(self.source_names.clone())
        } else {
            SourceSelector::ById(self.source_ids.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_emptiness() {
        assert!(SourceSelector::ById(vec![]).is_empty());
        assert!(SourceSelector::ByName(vec![]).is_empty());
        assert!(!SourceSelector::ById(vec!["a".into()]).is_empty());
        assert_eq!(SourceSelector::ByName(vec!["a".into(), "b".into()]).len(), 2);
    }

    #[test]
    fn test_lineage_prefers_ids() {
        let snapshot = MergedSnapshot {
            id: 1,
            name: "M1".into(),
            source_ids: vec!["id-a".into()],
            source_names: vec!["Pump House".into()],
            part_count: 4,
            created_at: Utc::now(),
        };
        assert_eq!(
            snapshot.lineage(),
            SourceSelector::ById(vec!["id-a".into()])
        );
    }

    #[test]
    fn test_lineage_falls_back_to_names() {
        let snapshot = MergedSnapshot {
            id: 2,
            name: "legacy".into(),
            source_ids: vec![],
            source_names: vec!["Pump House".into()],
            part_count: 1,
            created_at: Utc::now(),
        };
        assert_eq!(
            snapshot.lineage(),
            SourceSelector::ByName(vec!["Pump House".into()])
        );
    }

    #[test]
    fn test_new_part_record_rejects_unknown_fields() {
        let good = r#"{"part_code": "P1", "spec": "M8x20"}"#;
        assert!(serde_json::from_str::<NewPartRecord>(good).is_ok());

        let bad = r#"{"part_code": "P1", "supplier": "Acme"}"#;
        let err = serde_json::from_str::<NewPartRecord>(bad);
        assert!(err.is_err());
    }
}
