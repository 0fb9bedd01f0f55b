//! SQLite adapter
//!
//! Every user table is sampled independently: up to `max_records` rows per
//! table, each row observed as a record shaped `{table: {column: value}}`.
//! Columns therefore sit at `table.column`, one level below their table.
//! Cell values are coerced through the column's declared type, so a
//! `BOOLEAN` column holding 0/1 is seen as booleans and a `REAL` column
//! holding whole numbers is seen as floats.
//!
//! The database is opened read-only. Reader input is first spooled to a
//! temporary file because SQLite needs a file to open.

use std::io::BufRead;
use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, OpenFlags};
use tracing::{debug, trace};

use super::{IngestLimits, IngestSummary, SourceFormat, StreamIngester};
use crate::error::{Location, ProfilerError, Result};
use crate::observation::{Observation, ObservationSink, ObservedValue};
use crate::path::child_path;

const TABLES_QUERY: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
     AND sql NOT LIKE 'CREATE VIRTUAL%' \
     ORDER BY name";

/// Read-only SQLite adapter
#[derive(Debug, Clone)]
pub struct SqliteIngester {
    limits: IngestLimits,
}

/// How a declared column type shapes stored values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    Boolean,
    Integer,
    Real,
    Text,
    /// No declared type, or BLOB: values keep their storage class
    Untyped,
    /// NUMERIC, DECIMAL, DATE and anything else
    Numeric,
}

impl Affinity {
    /// SQLite's affinity rules, with booleans split out
    fn from_declared(declared: &str) -> Self {
        let upper = declared.to_ascii_uppercase();
        let has = |needle: &str| upper.contains(needle);
        if has("BOOL") {
            Affinity::Boolean
        } else if has("INT") {
            Affinity::Integer
        } else if has("CHAR") || has("CLOB") || has("TEXT") {
            Affinity::Text
        } else if upper.is_empty() || has("BLOB") {
            Affinity::Untyped
        } else if has("REAL") || has("FLOA") || has("DOUB") {
            Affinity::Real
        } else {
            Affinity::Numeric
        }
    }

    fn observe(self, value: ValueRef<'_>) -> ObservedValue {
        match value {
            ValueRef::Null => ObservedValue::Null,
            ValueRef::Integer(i) => match self {
                Affinity::Boolean if i == 0 || i == 1 => ObservedValue::Bool(i == 1),
                Affinity::Real => ObservedValue::Float(i as f64),
                Affinity::Text => ObservedValue::Str(i.to_string()),
                _ => ObservedValue::Int(i),
            },
            ValueRef::Real(f) if f.is_finite() && self != Affinity::Text => ObservedValue::Float(f),
            ValueRef::Real(f) => ObservedValue::Str(f.to_string()),
            ValueRef::Text(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                match self {
                    Affinity::Boolean if text.eq_ignore_ascii_case("true") => ObservedValue::Bool(true),
                    Affinity::Boolean if text.eq_ignore_ascii_case("false") => ObservedValue::Bool(false),
                    _ => ObservedValue::Str(text.into_owned()),
                }
            }
            ValueRef::Blob(bytes) => ObservedValue::Str(format!("<{} bytes>", bytes.len())),
        }
    }
}

struct Column {
    path: String,
    quoted: String,
    affinity: Affinity,
}

/// Quote an identifier for SQL text
fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn sqlite_error(e: rusqlite::Error) -> ProfilerError {
    match e {
        rusqlite::Error::SqliteFailure(err, message)
            if matches!(err.code, ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt) =>
        {
            ProfilerError::malformed(
                SourceFormat::Sqlite,
                Location::Unknown,
                message.unwrap_or_else(|| err.to_string()),
            )
        }
        other => ProfilerError::Sqlite(other),
    }
}

impl SqliteIngester {
    pub fn new(limits: IngestLimits) -> Self {
        Self { limits }
    }

    fn ingest_connection(&self, conn: &Connection, sink: &mut dyn ObservationSink) -> rusqlite::Result<IngestSummary> {
        let mut summary = IngestSummary::default();

        let tables: Vec<String> = conn
            .prepare(TABLES_QUERY)?
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        for table in &tables {
            self.ingest_table(conn, table, sink, &mut summary)?;
        }
        Ok(summary)
    }

    fn ingest_table(
        &self,
        conn: &Connection,
        table: &str,
        sink: &mut dyn ObservationSink,
        summary: &mut IngestSummary,
    ) -> rusqlite::Result<()> {
        let table_path = child_path("", table);
        let columns: Vec<Column> = conn
            .prepare(&format!("PRAGMA table_info({})", quote(table)))?
            .query_map([], |row| {
                let name: String = row.get(1)?;
                let declared: String = row.get::<_, Option<String>>(2)?.unwrap_or_default();
                Ok(Column {
                    path: child_path(&table_path, &name),
                    quoted: quote(&name),
                    affinity: Affinity::from_declared(&declared),
                })
            })?
            .collect::<rusqlite::Result<_>>()?;
        if columns.is_empty() {
            return Ok(());
        }

        let select = columns.iter().map(|c| c.quoted.as_str()).collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT {} FROM {} LIMIT ?1", select, quote(table));
        // One extra row tells whether the table was cut
        let fetch = i64::try_from(self.limits.max_records.saturating_add(1)).unwrap_or(i64::MAX);

        let mut statement = conn.prepare(&sql)?;
        let mut rows = statement.query([fetch])?;
        let mut sampled = 0u64;
        while let Some(row) = rows.next()? {
            if sampled >= self.limits.max_records {
                summary.records_truncated = true;
                break;
            }
            sampled += 1;

            sink.observe(Observation::new(table_path.clone(), ObservedValue::ObjectMarker, 0));
            if self.limits.max_depth == 0 {
                summary.depth_pruned += 1;
                trace!(path = %table_path, "pruned subtree");
                continue;
            }
            for (i, column) in columns.iter().enumerate() {
                let value = column.affinity.observe(row.get_ref(i)?);
                sink.observe(Observation::new(column.path.clone(), value, 1));
            }
        }

        summary.records_processed += sampled;
        debug!(table, columns = columns.len(), rows = sampled, "sampled table");
        Ok(())
    }
}

impl StreamIngester for SqliteIngester {
    fn format(&self) -> SourceFormat {
        SourceFormat::Sqlite
    }

    fn ingest(&self, reader: &mut dyn BufRead, sink: &mut dyn ObservationSink) -> Result<IngestSummary> {
        let mut spool = tempfile::NamedTempFile::new()?;
        std::io::copy(reader, spool.as_file_mut())?;
        self.ingest_file(spool.path(), sink)
    }

    fn ingest_file(&self, path: &Path, sink: &mut dyn ObservationSink) -> Result<IngestSummary> {
        // Surface a missing file as IO, not as an SQLite open failure
        std::fs::metadata(path)?;
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(sqlite_error)?;
        self.ingest_connection(&conn, sink).map_err(sqlite_error)
    }
}
