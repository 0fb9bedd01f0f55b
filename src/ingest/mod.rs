//! Document adapters
//!
//! Each adapter turns a byte stream in one source format into a stream of
//! [`Observation`]s without materializing the document. Memory use is bounded
//! by the current nesting depth and the in-flight container state.
//!
//! Limits are cooperative: reaching `max_records` stops reading, subtrees
//! deeper than `max_depth` are skipped, and arrays contribute only their first
//! `max_array_items` items. None of these is an error; the returned
//! [`IngestSummary`] records what was cut.
//!
//! [`Observation`]: crate::observation::Observation

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ProfilerConfig;
use crate::error::{ProfilerError, Result};
use crate::observation::ObservationSink;

mod json;
mod sqlite;
mod tabular;
mod xml;

pub use json::JsonIngester;
pub use sqlite::SqliteIngester;
pub use tabular::TabularIngester;
pub use xml::XmlIngester;

/// Supported source formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// A JSON document; a root array is a collection of records
    Json,
    /// One JSON record per line
    JsonLines,
    /// An XML document; children of the root element are records
    Xml,
    /// Comma-separated values with a header row
    Csv,
    /// Tab-separated values with a header row
    Tsv,
    /// A SQLite database; each sampled table row is a record
    Sqlite,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Json => "json",
            SourceFormat::JsonLines => "jsonl",
            SourceFormat::Xml => "xml",
            SourceFormat::Csv => "csv",
            SourceFormat::Tsv => "tsv",
            SourceFormat::Sqlite => "sqlite",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ProfilerError::UnsupportedFormat(path.display().to_string()))?;
        ext.parse()
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceFormat {
    type Err = ProfilerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(SourceFormat::Json),
            "jsonl" | "ndjson" | "json-lines" | "json_lines" => Ok(SourceFormat::JsonLines),
            "xml" => Ok(SourceFormat::Xml),
            "csv" => Ok(SourceFormat::Csv),
            "tsv" | "tab" => Ok(SourceFormat::Tsv),
            "sqlite" | "sqlite3" | "db" => Ok(SourceFormat::Sqlite),
            other => Err(ProfilerError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Traversal limits shared by all adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestLimits {
    /// Deepest depth that is still observed
    pub max_depth: usize,
    /// Records processed before reading stops
    pub max_records: u64,
    /// Items observed per array occurrence
    pub max_array_items: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_records: 10_000,
            max_array_items: 10,
        }
    }
}

impl From<&ProfilerConfig> for IngestLimits {
    fn from(config: &ProfilerConfig) -> Self {
        Self {
            max_depth: config.analysis.max_depth,
            max_records: config.analysis.max_records_to_analyze,
            max_array_items: config.analysis.max_array_items_sampled,
        }
    }
}

/// What an ingestion pass saw and what it cut
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Records whose fields were observed
    pub records_processed: u64,
    /// Reading stopped at `max_records` with input left over
    pub records_truncated: bool,
    /// Subtrees skipped for exceeding `max_depth`
    pub depth_pruned: u64,
    /// Array items skipped past `max_array_items`
    pub array_items_skipped: u64,
}

impl IngestSummary {
    /// Whether a limit cut the analysis short
    ///
    /// Array sampling is a fixed part of the adapter contract and does not
    /// count as truncation.
    pub fn truncated(&self) -> bool {
        self.records_truncated || self.depth_pruned > 0
    }
}

/// A format adapter
pub trait StreamIngester {
    /// Format this adapter reads
    fn format(&self) -> SourceFormat;

    /// Stream observations from `reader` into `sink`
    ///
    /// Fails with [`ProfilerError::MalformedInput`] on a syntax violation or
    /// [`ProfilerError::Io`] when the reader fails. Database adapters may also
    /// fail with [`ProfilerError::Sqlite`].
    fn ingest(&self, reader: &mut dyn BufRead, sink: &mut dyn ObservationSink) -> Result<IngestSummary>;

    /// Stream observations from the file at `path`
    fn ingest_file(&self, path: &Path, sink: &mut dyn ObservationSink) -> Result<IngestSummary> {
        let mut reader = BufReader::new(File::open(path)?);
        self.ingest(&mut reader, sink)
    }
}

/// Build the adapter for `format` from the profiler configuration
pub fn ingester_for(format: SourceFormat, config: &ProfilerConfig) -> Box<dyn StreamIngester + Send + Sync> {
    let limits = IngestLimits::from(config);
    match format {
        SourceFormat::Json => Box::new(JsonIngester::new(limits)),
        SourceFormat::JsonLines => Box::new(JsonIngester::lines(limits)),
        SourceFormat::Xml => Box::new(XmlIngester::new(
            limits,
            config.xml.strip_namespaces,
            config.xml.attribute_prefix.clone(),
        )),
        SourceFormat::Csv => Box::new(TabularIngester::csv(limits)),
        SourceFormat::Tsv => Box::new(TabularIngester::tsv(limits)),
        SourceFormat::Sqlite => Box::new(SqliteIngester::new(limits)),
    }
}
