//! Schema Profiler
//!
//! Streaming schema inference for semi-structured documents. A document
//! (JSON, JSON Lines, XML, CSV, TSV or a SQLite database) is read once,
//! without materializing it, into a catalog of every field it contains:
//! inferred data type, semantic category, PII classification and quality
//! statistics, together with a deterministic fingerprint for detecting
//! schema drift.
//!
//! ## Features
//!
//! - **Streaming Ingestion**: Bounded memory regardless of document size
//! - **Type Inference**: Confidence-scored primary types with null exclusion
//! - **Semantic Detection**: Emails, phones, URLs, dates, currencies and more
//! - **PII Flagging**: Name, semantic and value signals (Luhn-checked cards)
//! - **Drift Detection**: Fingerprints and breaking-change aware diffs
//!
//! ## Pipeline
//!
//! ```text
//! bytes ─► StreamIngester ─► FieldAccumulator ─► finalize (per field, parallel)
//!                                                  ├─ TypeInferrer
//!                                                  ├─ SemanticClassifier
//!                                                  ├─ PiiClassifier
//!                                                  └─ QualityStats
//!                                              ─► SchemaSnapshot (+ fingerprint)
//!
//! SchemaSnapshot × SchemaSnapshot ─► SchemaDiffer ─► SchemaDiff ─► VersionBump
//! ```

pub mod accumulator;
pub mod analyzer;
pub mod checksum;
pub mod compatibility;
pub mod config;
pub mod error;
pub mod inference;
pub mod ingest;
pub mod observation;
pub mod path;
pub mod pii;
pub mod quality;
pub mod schema;
pub mod semantic;
pub mod version;

pub use accumulator::{FieldAccumulator, FieldState};
pub use analyzer::SchemaAnalyzer;
pub use checksum::{fingerprint, Checksum};
pub use compatibility::{ChangeRecord, ChangeType, SchemaDiff, SchemaDiffer};
pub use config::ProfilerConfig;
pub use error::{ProfilerError, Result};
pub use inference::{DataType, TypeHistogram};
pub use ingest::{IngestSummary, SourceFormat, StreamIngester};
pub use observation::{Observation, ObservedValue};
pub use pii::PiiType;
pub use schema::{FieldRecord, SchemaSnapshot};
pub use semantic::SemanticType;
pub use version::{SchemaVersion, VersionBump};
