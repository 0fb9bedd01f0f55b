//! Error types for schema profiling

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::SourceFormat;

/// Result type for profiling operations
pub type Result<T> = std::result::Result<T, ProfilerError>;

/// Where in a source document a syntax violation was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// 1-based line and column (JSON)
    LineColumn { line: u64, column: u64 },
    /// 1-based line (CSV, JSON Lines)
    Line { line: u64 },
    /// Byte offset into the stream (XML)
    ByteOffset { offset: u64 },
    /// The adapter could not tell
    Unknown,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::LineColumn { line, column } => write!(f, "line {}, column {}", line, column),
            Location::Line { line } => write!(f, "line {}", line),
            Location::ByteOffset { offset } => write!(f, "byte {}", offset),
            Location::Unknown => write!(f, "unknown position"),
        }
    }
}

/// Schema profiler errors
///
/// [`ProfilerError::MalformedInput`] is raised for document content, and
/// [`ProfilerError::Sqlite`] for database queries that fail on a valid file.
/// Limits, ambiguous classification and skipped statistics are reported in
/// the returned snapshot instead.
#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Malformed {format} input at {location}: {message}")]
    MalformedInput {
        format: SourceFormat,
        location: Location,
        message: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unsupported source format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl ProfilerError {
    pub(crate) fn malformed(
        format: SourceFormat,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        ProfilerError::MalformedInput {
            format,
            location,
            message: message.into(),
        }
    }

    /// Whether the failure came from the document itself rather than the environment
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, ProfilerError::MalformedInput { .. })
    }
}
