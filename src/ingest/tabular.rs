//! CSV and TSV adapter
//!
//! The first row names the columns; every following row is one flat record
//! whose cells are observed at depth 0. Cells are typed by their text.

use std::io::BufRead;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use super::{IngestLimits, IngestSummary, SourceFormat, StreamIngester};
use crate::error::{Location, ProfilerError, Result};
use crate::observation::{Observation, ObservationSink, ObservedValue};
use crate::path::child_path;

/// Delimited-text adapter
#[derive(Debug, Clone)]
pub struct TabularIngester {
    limits: IngestLimits,
    format: SourceFormat,
    delimiter: u8,
}

impl TabularIngester {
    pub fn csv(limits: IngestLimits) -> Self {
        Self {
            limits,
            format: SourceFormat::Csv,
            delimiter: b',',
        }
    }

    pub fn tsv(limits: IngestLimits) -> Self {
        Self {
            limits,
            format: SourceFormat::Tsv,
            delimiter: b'\t',
        }
    }

    fn error(&self, e: csv::Error) -> ProfilerError {
        let location = e
            .position()
            .map(|p| Location::Line { line: p.line() })
            .unwrap_or(Location::Unknown);
        match e.into_kind() {
            csv::ErrorKind::Io(io) => ProfilerError::Io(io),
            kind => ProfilerError::malformed(self.format, location, describe(&kind)),
        }
    }
}

fn describe(kind: &csv::ErrorKind) -> String {
    match kind {
        csv::ErrorKind::UnequalLengths { expected_len, len, .. } => {
            format!("row has {} fields, header has {}", len, expected_len)
        }
        csv::ErrorKind::Utf8 { err, .. } => format!("invalid UTF-8: {}", err),
        other => format!("{:?}", other),
    }
}

/// Type a cell by its text
pub fn type_cell(cell: &str) -> ObservedValue {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return ObservedValue::Null;
    }
    if trimmed.eq_ignore_ascii_case("true") {
        return ObservedValue::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return ObservedValue::Bool(false);
    }
    if has_leading_zero(trimmed) {
        return ObservedValue::Str(cell.to_string());
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return ObservedValue::Int(i);
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => ObservedValue::Float(f),
        _ => ObservedValue::Str(cell.to_string()),
    }
}

/// Digits with a significant leading zero (`02134`, `-007`) are codes, not numbers
fn has_leading_zero(text: &str) -> bool {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text).as_bytes();
    digits.len() > 1 && digits[0] == b'0' && digits[1].is_ascii_digit()
}

impl StreamIngester for TabularIngester {
    fn format(&self) -> SourceFormat {
        self.format
    }

    fn ingest(&self, reader: &mut dyn BufRead, sink: &mut dyn ObservationSink) -> Result<IngestSummary> {
        let mut csv = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(reader);

        let columns: Vec<String> = csv
            .headers()
            .map_err(|e| self.error(e))?
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let header = header.trim();
                if header.is_empty() {
                    child_path("", &format!("column_{}", i))
                } else {
                    child_path("", header)
                }
            })
            .collect();
        debug!(format = %self.format, columns = columns.len(), "read header row");

        let mut summary = IngestSummary::default();
        let mut record = StringRecord::new();
        while csv.read_record(&mut record).map_err(|e| self.error(e))? {
            if summary.records_processed >= self.limits.max_records {
                summary.records_truncated = true;
                break;
            }
            summary.records_processed += 1;
            for (column, cell) in columns.iter().zip(record.iter()) {
                sink.observe(Observation::new(column.clone(), type_cell(cell), 0));
            }
        }

        Ok(summary)
    }
}
