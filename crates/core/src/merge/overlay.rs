//! Edit overlay: uncommitted field changes layered over a merged set.
//!
//! Edits are keyed by (record id, field) and never touch the underlying
//! rows until commit; the same pair may be set repeatedly and the last
//! write wins. Identity fields — part code and source attribution — are
//! not representable as [`PartField`], so attempts to edit them are
//! structurally a no-op rather than an error. Callers are expected to
//! prevent such edits in the UI; the overlay just ignores them.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::db::queries::{PartColumnValue, PartColumnWrite};

// ---------------------------------------------------------------------------
// Editable fields
// ---------------------------------------------------------------------------

/// The closed set of editable part fields.
///
/// Everything a record carries except its identity: `part_code`,
/// `source_id`, and `source_name` are deliberately absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PartField {
    Level,
    PartName,
    Spec,
    Version,
    Material,
    UnitCountPerLevel,
    UnitWeightKg,
    TotalWeightKg,
    PartProperty,
    DrawingSize,
    ReferenceNumber,
    PurchaseStatus,
    ProcessRoute,
    Remark,
}

impl PartField {
    /// Parse a wire-format field name. Returns `None` for identity fields
    /// and anything else outside the editable set.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "level" => Some(Self::Level),
            "part_name" => Some(Self::PartName),
            "spec" => Some(Self::Spec),
            "version" => Some(Self::Version),
            "material" => Some(Self::Material),
            "unit_count_per_level" => Some(Self::UnitCountPerLevel),
            "unit_weight_kg" => Some(Self::UnitWeightKg),
            "total_weight_kg" => Some(Self::TotalWeightKg),
            "part_property" => Some(Self::PartProperty),
            "drawing_size" => Some(Self::DrawingSize),
            "reference_number" => Some(Self::ReferenceNumber),
            "purchase_status" => Some(Self::PurchaseStatus),
            "process_route" => Some(Self::ProcessRoute),
            "remark" => Some(Self::Remark),
            _ => None,
        }
    }

    /// The database column this field maps to.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::PartName => "part_name",
            Self::Spec => "spec",
            Self::Version => "version",
            Self::Material => "material",
            Self::UnitCountPerLevel => "unit_count_per_level",
            Self::UnitWeightKg => "unit_weight_kg",
            Self::TotalWeightKg => "total_weight_kg",
            Self::PartProperty => "part_property",
            Self::DrawingSize => "drawing_size",
            Self::ReferenceNumber => "reference_number",
            Self::PurchaseStatus => "purchase_status",
            Self::ProcessRoute => "process_route",
            Self::Remark => "remark",
        }
    }

    /// Convert an edited value into a typed column value.
    ///
    /// All fields are text except `total_weight_kg`, which is stored as a
    /// REAL: an empty value clears it, an unparseable one yields `None`
    /// (the edit is dropped by the caller).
    fn column_value(&self, value: &str) -> Option<PartColumnValue> {
        match self {
            Self::TotalWeightKg => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    Some(PartColumnValue::Real(None))
                } else {
                    match trimmed.parse::<f64>() {
                        Ok(w) if w.is_finite() => Some(PartColumnValue::Real(Some(w))),
                        _ => None,
                    }
                }
            }
            _ => {
                if value.is_empty() {
                    Some(PartColumnValue::Text(None))
                } else {
                    Some(PartColumnValue::Text(Some(value.to_string())))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Wire-format edit
// ---------------------------------------------------------------------------

/// One field edit as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldEdit {
    /// Working-set row id of the target record.
    pub part_id: i64,
    /// Wire-format field name (e.g. `"spec"`).
    pub field: String,
    /// New value; empty clears the field.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Overlay
// ---------------------------------------------------------------------------

/// A transient, per-caller set of pending field edits.
///
/// Scoped to one merge session; never shared across callers. Concurrent
/// sessions editing the same rows are last-write-wins at commit time, with
/// no optimistic-lock detection.
#[derive(Debug, Default)]
pub struct EditOverlay {
    pending: BTreeMap<(i64, PartField), String>,
}

impl EditOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an edit. The last write to a (record, field) pair wins.
    pub fn set_field(&mut self, part_id: i64, field: PartField, value: impl Into<String>) {
        self.pending.insert((part_id, field), value.into());
    }

    /// Stage an edit addressed by wire-format field name.
    ///
    /// Returns false — and stages nothing — when the name does not belong
    /// to the editable field set (identity fields land here).
    pub fn set_field_by_name(&mut self, part_id: i64, field: &str, value: impl Into<String>) -> bool {
        match PartField::from_name(field) {
            Some(f) => {
                self.set_field(part_id, f, value);
                true
            }
            None => {
                warn!(part_id, field, "ignoring edit to non-editable field");
                false
            }
        }
    }

    /// Number of staged (record, field) pairs.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop all staged edits without persisting anything.
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    /// Drain the overlay into column writes for the rows in `known_ids`.
    ///
    /// Edits addressing rows outside the working set are skipped, as are
    /// values that fail typed conversion (a non-numeric weight). The
    /// overlay is empty afterwards.
    pub(crate) fn take_writes(&mut self, known_ids: &BTreeSet<i64>) -> Vec<PartColumnWrite> {
        let pending = std::mem::take(&mut self.pending);
        let mut writes = Vec::with_capacity(pending.len());
        for ((part_id, field), value) in pending {
            if !known_ids.contains(&part_id) {
                warn!(part_id, field = field.column_name(), "skipping edit to record outside the working set");
                continue;
            }
            match field.column_value(&value) {
                Some(column_value) => writes.push(PartColumnWrite {
                    part_id,
                    column: field.column_name(),
                    value: column_value,
                }),
                None => {
                    warn!(part_id, field = field.column_name(), value, "skipping edit with unconvertible value");
                }
            }
        }
        writes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[i64]) -> BTreeSet<i64> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_identity_fields_are_not_editable() {
        assert!(PartField::from_name("part_code").is_none());
        assert!(PartField::from_name("source_id").is_none());
        assert!(PartField::from_name("source_name").is_none());
        assert!(PartField::from_name("id").is_none());
        assert!(PartField::from_name("spec").is_some());
    }

    #[test]
    fn test_last_write_wins() {
        let mut overlay = EditOverlay::new();
        overlay.set_field(1, PartField::Spec, "M8");
        overlay.set_field(1, PartField::Spec, "M10");
        assert_eq!(overlay.pending_count(), 1);

        let writes = overlay.take_writes(&ids(&[1]));
        assert_eq!(writes.len(), 1);
        assert!(matches!(
            &writes[0].value,
            PartColumnValue::Text(Some(v)) if v == "M10"
        ));
    }

    #[test]
    fn test_set_by_name_rejects_identity() {
        let mut overlay = EditOverlay::new();
        assert!(!overlay.set_field_by_name(1, "part_code", "P9"));
        assert!(overlay.set_field_by_name(1, "remark", "checked"));
        assert_eq!(overlay.pending_count(), 1);
    }

    #[test]
    fn test_discard_clears_everything() {
        let mut overlay = EditOverlay::new();
        overlay.set_field(1, PartField::Spec, "M8");
        overlay.set_field(2, PartField::Remark, "x");
        overlay.discard();
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_take_writes_skips_unknown_rows() {
        let mut overlay = EditOverlay::new();
        overlay.set_field(1, PartField::Spec, "M8");
        overlay.set_field(99, PartField::Spec, "M8");
        let writes = overlay.take_writes(&ids(&[1]));
        assert_eq!(writes.len(), 1);
        assert!(overlay.is_empty());
    }

    #[test]
    fn test_weight_conversion() {
        let mut overlay = EditOverlay::new();
        overlay.set_field(1, PartField::TotalWeightKg, "1.25");
        overlay.set_field(2, PartField::TotalWeightKg, "");
        overlay.set_field(3, PartField::TotalWeightKg, "heavy");
        let writes = overlay.take_writes(&ids(&[1, 2, 3]));

        // The unparseable weight is dropped.
        assert_eq!(writes.len(), 2);
        assert!(matches!(writes[0].value, PartColumnValue::Real(Some(w)) if w == 1.25));
        assert!(matches!(writes[1].value, PartColumnValue::Real(None)));
    }

    #[test]
    fn test_empty_text_clears_field() {
        let mut overlay = EditOverlay::new();
        overlay.set_field(1, PartField::Remark, "");
        let writes = overlay.take_writes(&ids(&[1]));
        assert!(matches!(writes[0].value, PartColumnValue::Text(None)));
    }
}
