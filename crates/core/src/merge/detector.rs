//! Field-level conflict detection across a merged part set.
//!
//! Records are grouped by part code, and every group with two or more
//! members is compared over a fixed field list. Conflicts are surfaced,
//! never resolved: the detector reports which fields disagree and leaves
//! the records untouched.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::PartRecord;

/// Conflict result: part code -> names of the fields the group disagrees on.
///
/// Derived on every view and never persisted. Codes with no conflicting
/// fields are absent. A `BTreeMap` keeps iteration order stable regardless
/// of input order.
pub type ConflictMap = BTreeMap<String, Vec<&'static str>>;

/// The fixed list of compared fields, in reporting order. Part code is the
/// group key and is never itself a comparison target.
const COMPARED_FIELDS: &[(&str, fn(&PartRecord) -> String)] = &[
    ("level", |r| normalize_level(r.level.as_deref())),
    ("part_name", |r| normalize_text(r.part_name.as_deref())),
    ("spec", |r| normalize_text(r.spec.as_deref())),
    ("version", |r| normalize_text(r.version.as_deref())),
    ("material", |r| normalize_text(r.material.as_deref())),
    ("unit_count_per_level", |r| {
        normalize_text(r.unit_count_per_level.as_deref())
    }),
    ("unit_weight_kg", |r| normalize_text(r.unit_weight_kg.as_deref())),
    ("total_weight_kg", |r| normalize_weight(r.total_weight_kg)),
    ("part_property", |r| normalize_text(r.part_property.as_deref())),
    ("drawing_size", |r| normalize_text(r.drawing_size.as_deref())),
    ("reference_number", |r| {
        normalize_text(r.reference_number.as_deref())
    }),
    ("purchase_status", |r| normalize_text(r.purchase_status.as_deref())),
    ("process_route", |r| normalize_text(r.process_route.as_deref())),
    ("remark", |r| normalize_text(r.remark.as_deref())),
];

/// Stateless conflict detector over a merged record set.
pub struct ConflictDetector;

impl ConflictDetector {
    /// Group `records` by part code and report every field on which a
    /// group's members disagree after normalization.
    ///
    /// Records with a blank part code carry no identity information and
    /// are excluded from grouping entirely; they can never conflict.
    /// Exact duplicates form a group with no conflicting fields, which is
    /// omitted from the result. Never fails.
    pub fn detect(records: &[PartRecord]) -> ConflictMap {
        let mut groups: BTreeMap<&str, Vec<&PartRecord>> = BTreeMap::new();
        for record in records {
            let code = record.part_code.as_deref().unwrap_or("").trim();
            if code.is_empty() {
                continue;
            }
            groups.entry(code).or_default().push(record);
        }

        let mut conflicts = ConflictMap::new();
        for (code, members) in &groups {
            if members.len() < 2 {
                continue;
            }
            let fields = conflicting_fields(members);
            if !fields.is_empty() {
                conflicts.insert((*code).to_string(), fields);
            }
        }

        debug!(
            records = records.len(),
            groups = groups.len(),
            conflicted = conflicts.len(),
            "conflict detection complete"
        );
        conflicts
    }
}

/// Compare one group over the fixed field list, returning the names of the
/// fields with more than one distinct normalized value.
fn conflicting_fields(members: &[&PartRecord]) -> Vec<&'static str> {
    let mut fields = Vec::new();
    for (name, normalize) in COMPARED_FIELDS {
        let first = normalize(members[0]);
        if members[1..].iter().any(|&m| normalize(m) != first) {
            fields.push(*name);
        }
    }
    fields
}

/// Missing values normalize to the empty string; present values are
/// compared with surrounding whitespace stripped.
fn normalize_text(value: Option<&str>) -> String {
    value.unwrap_or("").trim().to_string()
}

/// Level is numeric in intent but textual in the wild: "1", "1.0", and 1
/// all denote the same level. Coerce to an integer when the text parses as
/// a finite number; otherwise fall back to trimmed-string comparison.
fn normalize_level(value: Option<&str>) -> String {
    let trimmed = value.unwrap_or("").trim();
    if trimmed.is_empty() {
        return String::new();
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => format!("{}", n as i64),
        _ => trimmed.to_string(),
    }
}

/// Format a stored weight canonically so representation can never differ.
fn normalize_weight(value: Option<f64>) -> String {
    match value {
        Some(w) => format!("{w}"),
        None => String::new(),
    }
}
