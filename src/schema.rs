//! Field records and schema snapshots

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::checksum::{fingerprint, Checksum};
use crate::error::Result;
use crate::inference::{DataType, TypeHistogram};
use crate::ingest::{IngestSummary, SourceFormat};
use crate::observation::SampleValue;
use crate::pii::PiiType;
use crate::quality::NumericStats;
use crate::semantic::SemanticType;

/// Finalized description of one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    /// Unique path of the field (e.g., "user.addresses[].city")
    pub field_path: String,
    /// Last key of the path
    pub field_name: String,
    /// Path of the containing field
    pub parent_path: Option<String>,
    pub nesting_level: usize,
    /// First-seen order within the analysis
    pub position: usize,

    pub data_type: DataType,
    /// 0-100
    pub type_confidence: f64,
    pub type_histogram: TypeHistogram,
    /// At least one null was observed
    pub is_nullable: bool,
    pub is_array: bool,
    /// Item type, for array fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_item_type: Option<DataType>,

    pub semantic_type: Option<SemanticType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_match_ratio: Option<f64>,
    pub is_pii: bool,
    pub pii_type: Option<PiiType>,

    pub sample_values: Vec<SampleValue>,
    pub null_count: u64,
    pub total_count: u64,
    /// 0-100
    pub null_percentage: f64,
    pub distinct_count: u64,
    /// 0-1
    pub cardinality_ratio: f64,
    /// Distribution of sampled values, numeric fields only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_stats: Option<NumericStats>,
}

#[cfg(test)]
impl FieldRecord {
    /// Minimal record with the given path and type
    pub(crate) fn for_test(path: &str, data_type: DataType) -> Self {
        Self {
            field_path: path.to_string(),
            field_name: crate::path::field_name(path),
            parent_path: crate::path::parent_path(path).map(str::to_string),
            nesting_level: 0,
            position: 0,
            data_type,
            type_confidence: 100.0,
            type_histogram: TypeHistogram::new(),
            is_nullable: false,
            is_array: false,
            array_item_type: None,
            semantic_type: None,
            semantic_match_ratio: None,
            is_pii: false,
            pii_type: None,
            sample_values: Vec::new(),
            null_count: 0,
            total_count: 1,
            null_percentage: 0.0,
            distinct_count: 1,
            cardinality_ratio: 1.0,
            numeric_stats: None,
        }
    }
}

/// Aggregate counts over a snapshot's fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub total_fields: usize,
    pub fields_by_type: BTreeMap<DataType, usize>,
    pub pii_fields: usize,
    pub nullable_fields: usize,
    pub array_fields: usize,
    pub semantic_fields: usize,
    pub max_nesting_level: usize,
}

/// The outcome of analyzing one document
///
/// Built once at the end of a pass and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    source_format: SourceFormat,
    fields: Vec<FieldRecord>,
    schema_hash: Checksum,
    total_records_observed: u64,
    truncated: bool,
    ingest: IngestSummary,
    created_at: DateTime<Utc>,
}

impl SchemaSnapshot {
    /// Assemble a snapshot, computing its fingerprint
    pub fn new(source_format: SourceFormat, fields: Vec<FieldRecord>, ingest: IngestSummary) -> Self {
        let schema_hash = fingerprint(&fields);
        Self {
            source_format,
            schema_hash,
            total_records_observed: ingest.records_processed,
            truncated: ingest.truncated(),
            fields,
            ingest,
            created_at: Utc::now(),
        }
    }

    pub fn source_format(&self) -> SourceFormat {
        self.source_format
    }

    /// Field records in first-seen order
    pub fn fields(&self) -> &[FieldRecord] {
        &self.fields
    }

    pub fn schema_hash(&self) -> &Checksum {
        &self.schema_hash
    }

    pub fn total_records_observed(&self) -> u64 {
        self.total_records_observed
    }

    /// Whether a limit cut the analysis short
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn ingest(&self) -> &IngestSummary {
        &self.ingest
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get a field by path
    pub fn get_field(&self, path: &str) -> Option<&FieldRecord> {
        self.fields.iter().find(|f| f.field_path == path)
    }

    /// Check the stored hash against the fields
    pub fn verify_hash(&self) -> bool {
        fingerprint(&self.fields) == self.schema_hash
    }

    pub fn stats(&self) -> SnapshotStats {
        let mut stats = SnapshotStats {
            total_fields: self.fields.len(),
            ..Default::default()
        };
        for field in &self.fields {
            *stats.fields_by_type.entry(field.data_type).or_insert(0) += 1;
            stats.pii_fields += usize::from(field.is_pii);
            stats.nullable_fields += usize::from(field.is_nullable);
            stats.array_fields += usize::from(field.is_array);
            stats.semantic_fields += usize::from(field.semantic_type.is_some());
            stats.max_nesting_level = stats.max_nesting_level.max(field.nesting_level);
        }
        stats
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Write the snapshot as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Read a snapshot written by [`SchemaSnapshot::save`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
