//! Analysis pipeline
//!
//! One pass per document: an adapter streams observations into a
//! [`FieldAccumulator`], then every field is finalized on its own (type,
//! semantic and PII classification, quality statistics) and the records are
//! assembled into a [`SchemaSnapshot`].

use std::io::BufRead;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::accumulator::{AccumulatorLimits, FieldAccumulator, FieldState};
use crate::config::ProfilerConfig;
use crate::error::Result;
use crate::inference::{infer, infer_array_item_type};
use crate::ingest::{ingester_for, IngestSummary, SourceFormat};
use crate::pii::PiiClassifier;
use crate::quality::compute_stats;
use crate::schema::{FieldRecord, SchemaSnapshot};
use crate::semantic::SemanticClassifier;

/// Runs analysis passes with one validated configuration
#[derive(Debug)]
pub struct SchemaAnalyzer {
    config: ProfilerConfig,
    semantic: SemanticClassifier,
    pii: PiiClassifier,
}

impl SchemaAnalyzer {
    /// Validate `config` and build the classifiers
    pub fn new(config: ProfilerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            semantic: SemanticClassifier::from_config(&config),
            pii: PiiClassifier::from_config(&config),
            config,
        })
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Analyze a document read from `reader`
    pub fn analyze_reader(&self, reader: &mut dyn BufRead, format: SourceFormat) -> Result<SchemaSnapshot> {
        info!(format = %format, "starting analysis");

        let ingester = ingester_for(format, &self.config);
        let mut accumulator = FieldAccumulator::new(AccumulatorLimits::from(&self.config));
        let summary = ingester.ingest(reader, &mut accumulator)?;
        Ok(self.assemble(format, &accumulator, summary))
    }

    fn assemble(&self, format: SourceFormat, accumulator: &FieldAccumulator, summary: IngestSummary) -> SchemaSnapshot {
        let fields = self.finalize_all(accumulator.fields());
        let snapshot = SchemaSnapshot::new(format, fields, summary);

        if snapshot.is_truncated() {
            warn!(
                records = snapshot.ingest().records_processed,
                records_truncated = snapshot.ingest().records_truncated,
                depth_pruned = snapshot.ingest().depth_pruned,
                "analysis truncated by limits"
            );
        }
        info!(
            records = snapshot.total_records_observed(),
            fields = snapshot.fields().len(),
            schema_hash = %snapshot.schema_hash(),
            "analysis complete"
        );
        snapshot
    }

    /// Analyze a file; the format is guessed from the extension unless given
    pub fn analyze_path(&self, path: impl AsRef<Path>, format: Option<SourceFormat>) -> Result<SchemaSnapshot> {
        let path = path.as_ref();
        let format = match format {
            Some(format) => format,
            None => SourceFormat::from_path(path)?,
        };
        info!(path = %path.display(), format = %format, "starting analysis");

        let ingester = ingester_for(format, &self.config);
        let mut accumulator = FieldAccumulator::new(AccumulatorLimits::from(&self.config));
        let summary = ingester.ingest_file(path, &mut accumulator)?;
        Ok(self.assemble(format, &accumulator, summary))
    }

    /// Analyze an in-memory document
    pub fn analyze_str(&self, input: &str, format: SourceFormat) -> Result<SchemaSnapshot> {
        let mut reader = input.as_bytes();
        self.analyze_reader(&mut reader, format)
    }

    /// Finalize every field, keeping first-seen order
    pub fn finalize_all(&self, states: &[FieldState]) -> Vec<FieldRecord> {
        if self.config.analysis.parallel_finalize {
            states.par_iter().map(|state| self.finalize(state)).collect()
        } else {
            states.iter().map(|state| self.finalize(state)).collect()
        }
    }

    /// Classify one accumulated field
    pub fn finalize(&self, state: &FieldState) -> FieldRecord {
        let inference = infer(&state.type_histogram);
        let data_type = inference.data_type;

        let semantic = self
            .semantic
            .classify(&state.field_name, &state.sample_values, data_type);
        let pii = self.pii.classify(
            &state.field_path,
            &state.field_name,
            semantic.map(|s| s.semantic_type),
            &state.sample_values,
        );
        let quality = compute_stats(
            data_type,
            state.total_count,
            state.null_count,
            state.distinct_count(),
            &state.numeric_samples,
        );
        let array_item_type = state
            .is_array
            .then(|| infer_array_item_type(&state.array_item_type_tags));

        debug!(
            field = %state.field_path,
            data_type = %data_type,
            confidence = inference.confidence,
            semantic = ?semantic.map(|s| s.semantic_type),
            "finalized field"
        );

        FieldRecord {
            field_path: state.field_path.clone(),
            field_name: state.field_name.clone(),
            parent_path: state.parent_path.clone(),
            nesting_level: state.nesting_level,
            position: state.position,
            data_type,
            type_confidence: inference.confidence,
            type_histogram: state.type_histogram.clone(),
            is_nullable: state.null_count > 0,
            is_array: state.is_array,
            array_item_type,
            semantic_type: semantic.map(|s| s.semantic_type),
            semantic_match_ratio: semantic.map(|s| s.match_ratio),
            is_pii: pii.is_some(),
            pii_type: pii.map(|p| p.pii_type),
            sample_values: state.sample_values.clone(),
            null_count: state.null_count,
            total_count: state.total_count,
            null_percentage: quality.null_percentage,
            distinct_count: quality.distinct_count,
            cardinality_ratio: quality.cardinality_ratio,
            numeric_stats: quality.numeric,
        }
    }
}
