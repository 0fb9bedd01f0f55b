//! Schema diffing
//!
//! Compares the field sets of two snapshots by path and detects breaking
//! changes. A removed field, a changed data type and a nullable field turning
//! required are breaking; everything else is compatible.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::inference::DataType;
use crate::pii::PiiType;
use crate::schema::{FieldRecord, SchemaSnapshot};
use crate::semantic::SemanticType;

/// Type of field change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    /// Present only in the new snapshot
    Added,
    /// Present only in the old snapshot
    Removed,
    /// Present in both with differing attributes
    Modified,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeType::Added => "added",
            ChangeType::Removed => "removed",
            ChangeType::Modified => "modified",
        };
        f.write_str(s)
    }
}

/// The attributes of a field that a diff compares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldProjection {
    pub data_type: DataType,
    pub is_nullable: bool,
    pub is_array: bool,
    pub semantic_type: Option<SemanticType>,
    pub is_pii: bool,
    pub pii_type: Option<PiiType>,
}

impl From<&FieldRecord> for FieldProjection {
    fn from(record: &FieldRecord) -> Self {
        Self {
            data_type: record.data_type,
            is_nullable: record.is_nullable,
            is_array: record.is_array,
            semantic_type: record.semantic_type,
            is_pii: record.is_pii,
            pii_type: record.pii_type,
        }
    }
}

impl FieldProjection {
    /// Human-readable differences from `old` to `self`
    fn differences_from(&self, old: &FieldProjection) -> Vec<String> {
        let mut details = Vec::new();
        if old.data_type != self.data_type {
            details.push(format!("Type changed: {} -> {}", old.data_type, self.data_type));
        }
        if old.semantic_type != self.semantic_type {
            details.push(format!(
                "Semantic type changed: {} -> {}",
                display_option(old.semantic_type),
                display_option(self.semantic_type)
            ));
        }
        if old.is_nullable != self.is_nullable {
            details.push(format!(
                "Nullability changed: {} -> {}",
                old.is_nullable, self.is_nullable
            ));
        }
        if old.is_array != self.is_array {
            details.push(format!("Array status changed: {} -> {}", old.is_array, self.is_array));
        }
        if old.is_pii != self.is_pii {
            details.push(format!("PII status changed: {} -> {}", old.is_pii, self.is_pii));
        } else if old.pii_type != self.pii_type {
            details.push(format!(
                "PII type changed: {} -> {}",
                display_option(old.pii_type),
                display_option(self.pii_type)
            ));
        }
        details
    }

    /// Whether moving from `old` to `self` breaks consumers of `old`
    fn breaks(&self, old: &FieldProjection) -> bool {
        old.data_type != self.data_type || (old.is_nullable && !self.is_nullable)
    }
}

fn display_option<T: fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "none".to_string())
}

/// A detected change between two snapshots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub change_type: ChangeType,
    pub field_path: String,
    pub old: Option<FieldProjection>,
    pub new: Option<FieldProjection>,
    pub is_breaking: bool,
    /// What changed, for modified fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

/// Aggregate counts of a diff
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub fields_added: usize,
    pub fields_removed: usize,
    pub fields_modified: usize,
    pub breaking_changes: usize,
    pub old_field_count: usize,
    pub new_field_count: usize,
}

/// Result of comparing two snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDiff {
    /// Changes sorted by field path
    pub changes: Vec<ChangeRecord>,
    pub summary: DiffSummary,
    pub old_hash: Checksum,
    pub new_hash: Checksum,
}

impl SchemaDiff {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn is_breaking(&self) -> bool {
        self.summary.breaking_changes > 0
    }

    /// Changes of one kind
    pub fn changes_of(&self, change_type: ChangeType) -> impl Iterator<Item = &ChangeRecord> {
        self.changes.iter().filter(move |c| c.change_type == change_type)
    }

    /// One-line description of the diff
    pub fn summary_line(&self) -> String {
        if !self.has_changes() {
            return "No changes detected".to_string();
        }
        format!(
            "{} added, {} removed, {} modified ({} breaking)",
            self.summary.fields_added,
            self.summary.fields_removed,
            self.summary.fields_modified,
            self.summary.breaking_changes
        )
    }
}

/// Compares snapshots field by field
#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaDiffer;

impl SchemaDiffer {
    pub fn new() -> Self {
        Self
    }

    /// Diff two field sets by path; changes come back sorted by path
    pub fn diff_records(&self, old: &[FieldRecord], new: &[FieldRecord]) -> Vec<ChangeRecord> {
        let old_by_path: BTreeMap<&str, &FieldRecord> =
            old.iter().map(|r| (r.field_path.as_str(), r)).collect();
        let new_by_path: BTreeMap<&str, &FieldRecord> =
            new.iter().map(|r| (r.field_path.as_str(), r)).collect();

        let mut paths: Vec<&str> = old_by_path.keys().chain(new_by_path.keys()).copied().collect();
        paths.sort_unstable();
        paths.dedup();

        paths
            .into_iter()
            .filter_map(|path| {
                match (old_by_path.get(path), new_by_path.get(path)) {
                    (None, Some(added)) => Some(ChangeRecord {
                        change_type: ChangeType::Added,
                        field_path: path.to_string(),
                        old: None,
                        new: Some(FieldProjection::from(*added)),
                        is_breaking: false,
                        details: Vec::new(),
                    }),
                    (Some(removed), None) => Some(ChangeRecord {
                        change_type: ChangeType::Removed,
                        field_path: path.to_string(),
                        old: Some(FieldProjection::from(*removed)),
                        new: None,
                        is_breaking: true,
                        details: Vec::new(),
                    }),
                    (Some(before), Some(after)) => {
                        let before = FieldProjection::from(*before);
                        let after = FieldProjection::from(*after);
                        let details = after.differences_from(&before);
                        if details.is_empty() {
                            return None;
                        }
                        Some(ChangeRecord {
                            change_type: ChangeType::Modified,
                            field_path: path.to_string(),
                            is_breaking: after.breaks(&before),
                            old: Some(before),
                            new: Some(after),
                            details,
                        })
                    }
                    (None, None) => None,
                }
            })
            .collect()
    }

    /// Diff two snapshots
    pub fn diff(&self, old: &SchemaSnapshot, new: &SchemaSnapshot) -> SchemaDiff {
        let changes = self.diff_records(old.fields(), new.fields());
        let count = |t: ChangeType| changes.iter().filter(|c| c.change_type == t).count();
        let summary = DiffSummary {
            fields_added: count(ChangeType::Added),
            fields_removed: count(ChangeType::Removed),
            fields_modified: count(ChangeType::Modified),
            breaking_changes: changes.iter().filter(|c| c.is_breaking).count(),
            old_field_count: old.fields().len(),
            new_field_count: new.fields().len(),
        };
        SchemaDiff {
            changes,
            summary,
            old_hash: old.schema_hash().clone(),
            new_hash: new.schema_hash().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{IngestSummary, SourceFormat};

    fn record(path: &str, data_type: DataType) -> FieldRecord {
        FieldRecord::for_test(path, data_type)
    }

    fn nullable(path: &str, data_type: DataType) -> FieldRecord {
        let mut r = record(path, data_type);
        r.is_nullable = true;
        r
    }

    #[test]
    fn test_removed_is_breaking() {
        let changes = SchemaDiffer::new().diff_records(&[record("a", DataType::String)], &[]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Removed);
        assert!(changes[0].is_breaking);
    }

    #[test]
    fn test_added_optional_is_not_breaking() {
        let changes = SchemaDiffer::new().diff_records(&[], &[nullable("nickname", DataType::String)]);
        assert_eq!(changes[0].change_type, ChangeType::Added);
        assert!(!changes[0].is_breaking);
    }

    #[test]
    fn test_type_change_is_breaking() {
        let changes = SchemaDiffer::new().diff_records(
            &[record("id", DataType::Integer)],
            &[record("id", DataType::String)],
        );
        assert_eq!(changes[0].change_type, ChangeType::Modified);
        assert!(changes[0].is_breaking);
        assert_eq!(changes[0].details, vec!["Type changed: integer -> string"]);
    }

    #[test]
    fn test_nullability_direction() {
        let differ = SchemaDiffer::new();
        let narrowing = differ.diff_records(
            &[nullable("a", DataType::String)],
            &[record("a", DataType::String)],
        );
        assert!(narrowing[0].is_breaking);

        let widening = differ.diff_records(
            &[record("a", DataType::String)],
            &[nullable("a", DataType::String)],
        );
        assert_eq!(widening[0].change_type, ChangeType::Modified);
        assert!(!widening[0].is_breaking);
    }

    #[test]
    fn test_semantic_and_pii_changes_are_compatible() {
        let mut after = record("contact", DataType::String);
        after.semantic_type = Some(SemanticType::Email);
        after.is_pii = true;
        let changes = SchemaDiffer::new().diff_records(&[record("contact", DataType::String)], &[after]);
        assert_eq!(changes.len(), 1);
        assert!(!changes[0].is_breaking);
        assert_eq!(changes[0].details.len(), 2);
    }

    #[test]
    fn test_pii_type_change_is_reported() {
        let mut before = record("contact", DataType::String);
        before.is_pii = true;
        before.pii_type = Some(PiiType::Email);
        let mut after = before.clone();
        after.pii_type = Some(PiiType::Phone);

        let changes = SchemaDiffer::new().diff_records(&[before], &[after]);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Modified);
        assert!(!changes[0].is_breaking);
        assert_eq!(changes[0].details, vec!["PII type changed: email -> phone"]);
    }

    #[test]
    fn test_unchanged_fields_produce_nothing() {
        let fields = vec![record("a", DataType::String), record("b", DataType::Float)];
        assert!(SchemaDiffer::new().diff_records(&fields, &fields).is_empty());
    }

    #[test]
    fn test_changes_sorted_by_path() {
        let old = vec![record("z", DataType::String), record("m", DataType::String)];
        let new = vec![record("a", DataType::String), record("m", DataType::Integer)];
        let paths: Vec<_> = SchemaDiffer::new()
            .diff_records(&old, &new)
            .into_iter()
            .map(|c| c.field_path)
            .collect();
        assert_eq!(paths, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_snapshot_diff_summary() {
        let old = SchemaSnapshot::new(
            SourceFormat::Json,
            vec![record("a", DataType::String), record("b", DataType::Integer)],
            IngestSummary::default(),
        );
        let new = SchemaSnapshot::new(
            SourceFormat::Json,
            vec![record("b", DataType::Float), record("c", DataType::Boolean)],
            IngestSummary::default(),
        );
        let diff = SchemaDiffer::new().diff(&old, &new);

        assert_eq!(diff.summary.fields_added, 1);
        assert_eq!(diff.summary.fields_removed, 1);
        assert_eq!(diff.summary.fields_modified, 1);
        assert_eq!(diff.summary.breaking_changes, 2);
        assert!(diff.is_breaking());
        assert_ne!(diff.old_hash, diff.new_hash);
        assert_eq!(diff.changes_of(ChangeType::Added).count(), 1);
        assert_eq!(diff.summary_line(), "1 added, 1 removed, 1 modified (2 breaking)");
    }
}
