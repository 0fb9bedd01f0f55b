//! JSON and JSON Lines adapter
//!
//! The document is walked by a seeded serde visitor straight off the reader,
//! so no `serde_json::Value` tree is ever built. Skipped subtrees (too deep,
//! or array items past the sample limit) are consumed as [`IgnoredAny`].
//! Hitting the record limit aborts the parse through a sentinel error, which
//! is then swallowed: reading stops instead of scanning the rest of the file.

use std::fmt;
use std::io::BufRead;

use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use tracing::trace;

use super::{IngestLimits, IngestSummary, SourceFormat, StreamIngester};
use crate::error::{Location, ProfilerError, Result};
use crate::observation::{Observation, ObservationSink, ObservedValue};
use crate::path::{child_path, item_path};

const RECORD_LIMIT_REACHED: &str = "record limit reached";

/// Streaming JSON adapter
#[derive(Debug, Clone)]
pub struct JsonIngester {
    limits: IngestLimits,
    lines: bool,
}

impl JsonIngester {
    /// Adapter for a single JSON document
    pub fn new(limits: IngestLimits) -> Self {
        Self { limits, lines: false }
    }

    /// Adapter for JSON Lines (one record per line)
    pub fn lines(limits: IngestLimits) -> Self {
        Self { limits, lines: true }
    }

    fn ingest_document(&self, reader: &mut dyn BufRead, sink: &mut dyn ObservationSink) -> Result<IngestSummary> {
        let mut walker = Walker::new(self.limits, sink);
        let mut de = serde_json::Deserializer::from_reader(reader);
        let outcome = DocumentSeed { walker: &mut walker }
            .deserialize(&mut de)
            .and_then(|()| de.end());

        match outcome {
            Ok(()) => Ok(walker.summary),
            Err(_) if walker.stopped => Ok(walker.summary),
            Err(e) => Err(json_error(SourceFormat::Json, e, None)),
        }
    }

    fn ingest_lines(&self, reader: &mut dyn BufRead, sink: &mut dyn ObservationSink) -> Result<IngestSummary> {
        let mut walker = Walker::new(self.limits, sink);
        let mut line = String::new();
        let mut line_no = 0u64;

        loop {
            line.clear();
            let read = reader.read_line(&mut line).map_err(|e| {
                if e.kind() == std::io::ErrorKind::InvalidData {
                    ProfilerError::malformed(
                        SourceFormat::JsonLines,
                        Location::Line { line: line_no + 1 },
                        e.to_string(),
                    )
                } else {
                    ProfilerError::Io(e)
                }
            })?;
            if read == 0 {
                break;
            }
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            if walker.summary.records_processed >= self.limits.max_records {
                walker.summary.records_truncated = true;
                break;
            }

            let mut de = serde_json::Deserializer::from_str(&line);
            ValueSeed::record(&mut walker)
                .deserialize(&mut de)
                .and_then(|()| de.end())
                .map_err(|e| json_error(SourceFormat::JsonLines, e, Some(line_no)))?;
            walker.summary.records_processed += 1;
        }

        Ok(walker.summary)
    }
}

impl StreamIngester for JsonIngester {
    fn format(&self) -> SourceFormat {
        if self.lines {
            SourceFormat::JsonLines
        } else {
            SourceFormat::Json
        }
    }

    fn ingest(&self, reader: &mut dyn BufRead, sink: &mut dyn ObservationSink) -> Result<IngestSummary> {
        if self.lines {
            self.ingest_lines(reader, sink)
        } else {
            self.ingest_document(reader, sink)
        }
    }
}

fn json_error(format: SourceFormat, e: serde_json::Error, line: Option<u64>) -> ProfilerError {
    if e.is_io() {
        return ProfilerError::Io(e.into());
    }
    let location = Location::LineColumn {
        line: line.unwrap_or(e.line() as u64),
        column: e.column() as u64,
    };
    // serde_json appends its own position to the message
    let message = e.to_string();
    let message = match message.rsplit_once(" at line ") {
        Some((head, _)) => head.to_string(),
        None => message,
    };
    ProfilerError::malformed(format, location, message)
}

// =============================================================================
// Traversal state
// =============================================================================

struct Walker<'s> {
    sink: &'s mut dyn ObservationSink,
    limits: IngestLimits,
    summary: IngestSummary,
    /// Set when the record limit aborted the parse
    stopped: bool,
}

impl<'s> Walker<'s> {
    fn new(limits: IngestLimits, sink: &'s mut dyn ObservationSink) -> Self {
        Self {
            sink,
            limits,
            summary: IngestSummary::default(),
            stopped: false,
        }
    }

    fn prune(&mut self, path: &str) {
        trace!(path, max_depth = self.limits.max_depth, "pruned subtree");
        self.summary.depth_pruned += 1;
    }
}

// =============================================================================
// Document root
// =============================================================================

/// Visits the document root: an array is a collection of records, anything
/// else is a single record.
struct DocumentSeed<'w, 's> {
    walker: &'w mut Walker<'s>,
}

impl<'de, 'w, 's> DeserializeSeed<'de> for DocumentSeed<'w, 's> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'w, 's> DocumentSeed<'w, 's> {
    fn scalar_record<E>(self) -> std::result::Result<(), E> {
        self.walker.summary.records_processed = 1;
        Ok(())
    }
}

impl<'de, 'w, 's> Visitor<'de> for DocumentSeed<'w, 's> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON document")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<(), A::Error> {
        loop {
            if self.walker.summary.records_processed >= self.walker.limits.max_records {
                if seq.next_element::<IgnoredAny>()?.is_some() {
                    self.walker.summary.records_truncated = true;
                    self.walker.stopped = true;
                    return Err(de::Error::custom(RECORD_LIMIT_REACHED));
                }
                return Ok(());
            }
            match seq.next_element_seed(ValueSeed::record(&mut *self.walker))? {
                Some(()) => self.walker.summary.records_processed += 1,
                None => return Ok(()),
            }
        }
    }

    fn visit_map<A: MapAccess<'de>>(self, map: A) -> std::result::Result<(), A::Error> {
        ValueSeed::record(&mut *self.walker).visit_map(map)?;
        self.walker.summary.records_processed = 1;
        Ok(())
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> std::result::Result<(), E> {
        self.scalar_record()
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> std::result::Result<(), E> {
        self.scalar_record()
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> std::result::Result<(), E> {
        self.scalar_record()
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> std::result::Result<(), E> {
        self.scalar_record()
    }

    fn visit_str<E: de::Error>(self, _: &str) -> std::result::Result<(), E> {
        self.scalar_record()
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<(), E> {
        self.scalar_record()
    }
}

// =============================================================================
// Values
// =============================================================================

/// Visits one value at `path`
struct ValueSeed<'w, 's> {
    walker: &'w mut Walker<'s>,
    path: String,
    /// Depth of this value; `None` for a record root, which is not a field
    depth: Option<usize>,
    is_array_item: bool,
}

impl<'w, 's> ValueSeed<'w, 's> {
    fn record(walker: &'w mut Walker<'s>) -> Self {
        Self {
            walker,
            path: String::new(),
            depth: None,
            is_array_item: false,
        }
    }

    fn child_depth(&self) -> usize {
        self.depth.map_or(0, |d| d + 1)
    }

    fn emit(&mut self, value: ObservedValue) {
        if let Some(depth) = self.depth {
            self.walker.sink.observe(Observation {
                path: self.path.clone(),
                value,
                depth,
                is_array_item: self.is_array_item,
            });
        }
    }

    fn scalar<E>(mut self, value: ObservedValue) -> std::result::Result<(), E> {
        self.emit(value);
        Ok(())
    }
}

impl<'de, 'w, 's> DeserializeSeed<'de> for ValueSeed<'w, 's> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> std::result::Result<(), D::Error> {
        deserializer.deserialize_any(self)
    }
}

impl<'de, 'w, 's> Visitor<'de> for ValueSeed<'w, 's> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<(), E> {
        self.scalar(ObservedValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<(), E> {
        self.scalar(ObservedValue::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<(), E> {
        let value = match i64::try_from(v) {
            Ok(i) => ObservedValue::Int(i),
            Err(_) => ObservedValue::Float(v as f64),
        };
        self.scalar(value)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<(), E> {
        self.scalar(ObservedValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<(), E> {
        self.scalar(ObservedValue::Str(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<(), E> {
        self.scalar(ObservedValue::Str(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<(), E> {
        self.scalar(ObservedValue::Null)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<(), E> {
        self.scalar(ObservedValue::Null)
    }

    fn visit_map<A: MapAccess<'de>>(mut self, mut map: A) -> std::result::Result<(), A::Error> {
        self.emit(ObservedValue::ObjectMarker);
        let depth = self.child_depth();

        while let Some(key) = map.next_key::<String>()? {
            let path = child_path(&self.path, &key);
            if depth > self.walker.limits.max_depth {
                self.walker.prune(&path);
                map.next_value::<IgnoredAny>()?;
                continue;
            }
            map.next_value_seed(ValueSeed {
                walker: &mut *self.walker,
                path,
                depth: Some(depth),
                is_array_item: false,
            })?;
        }
        Ok(())
    }

    fn visit_seq<A: SeqAccess<'de>>(mut self, mut seq: A) -> std::result::Result<(), A::Error> {
        self.emit(ObservedValue::ArrayMarker);
        let depth = self.child_depth();
        let items = item_path(&self.path);
        let too_deep = depth > self.walker.limits.max_depth;
        let mut sampled = 0usize;

        loop {
            if too_deep || sampled >= self.walker.limits.max_array_items {
                if seq.next_element::<IgnoredAny>()?.is_none() {
                    return Ok(());
                }
                if too_deep {
                    self.walker.prune(&items);
                } else {
                    self.walker.summary.array_items_skipped += 1;
                }
                continue;
            }

            let seed = ValueSeed {
                walker: &mut *self.walker,
                path: items.clone(),
                depth: Some(depth),
                is_array_item: true,
            };
            match seq.next_element_seed(seed)? {
                Some(()) => sampled += 1,
                None => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(ingester: &JsonIngester, input: &str) -> Result<(Vec<Observation>, IngestSummary)> {
        let mut observations = Vec::new();
        let mut reader = input.as_bytes();
        let summary = ingester.ingest(&mut reader, &mut observations)?;
        Ok((observations, summary))
    }

    fn paths(observations: &[Observation]) -> Vec<&str> {
        observations.iter().map(|o| o.path.as_str()).collect()
    }

    #[test]
    fn test_nested_object_paths_and_depths() {
        let ingester = JsonIngester::new(IngestLimits::default());
        let (obs, summary) = run(&ingester, r#"{"user": {"id": 1, "email": "a@b.com"}}"#).unwrap();

        assert_eq!(paths(&obs), vec!["user", "user.id", "user.email"]);
        assert_eq!(obs[0].value, ObservedValue::ObjectMarker);
        assert_eq!(obs[0].depth, 0);
        assert_eq!(obs[1].value, ObservedValue::Int(1));
        assert_eq!(obs[1].depth, 1);
        assert_eq!(summary.records_processed, 1);
        assert!(!summary.truncated());
    }

    #[test]
    fn test_root_array_is_record_collection() {
        let ingester = JsonIngester::new(IngestLimits::default());
        let (obs, summary) = run(&ingester, r#"[{"a": 1}, {"a": null, "b": true}]"#).unwrap();

        assert_eq!(paths(&obs), vec!["a", "a", "b"]);
        assert_eq!(obs[1].value, ObservedValue::Null);
        assert_eq!(summary.records_processed, 2);
    }

    #[test]
    fn test_array_items_use_item_path() {
        let ingester = JsonIngester::new(IngestLimits::default());
        let (obs, _) = run(&ingester, r#"{"tags": ["x", "y"], "addresses": [{"city": "Oslo"}]}"#).unwrap();

        assert_eq!(
            paths(&obs),
            vec!["tags", "tags[]", "tags[]", "addresses", "addresses[]", "addresses[].city"]
        );
        assert_eq!(obs[0].value, ObservedValue::ArrayMarker);
        assert!(!obs[0].is_array_item);
        assert!(obs[1].is_array_item);
        assert_eq!(obs[1].depth, 1);
        assert!(!obs[5].is_array_item);
        assert_eq!(obs[5].depth, 2);
    }

    #[test]
    fn test_array_sampling_limit() {
        let items: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        let input = format!(r#"{{"values": [{}]}}"#, items.join(","));
        let ingester = JsonIngester::new(IngestLimits::default());
        let (obs, summary) = run(&ingester, &input).unwrap();

        let item_count = obs.iter().filter(|o| o.path == "values[]").count();
        assert_eq!(item_count, 10);
        assert_eq!(summary.array_items_skipped, 40);
        assert!(!summary.truncated());
    }

    #[test]
    fn test_depth_pruning() {
        let limits = IngestLimits {
            max_depth: 1,
            ..Default::default()
        };
        let ingester = JsonIngester::new(limits);
        let (obs, summary) = run(&ingester, r#"{"a": {"b": {"c": 1}}, "d": 2}"#).unwrap();

        assert_eq!(paths(&obs), vec!["a", "a.b", "d"]);
        assert_eq!(summary.depth_pruned, 1);
        assert!(summary.truncated());
    }

    #[test]
    fn test_record_limit_stops_early() {
        let limits = IngestLimits {
            max_records: 2,
            ..Default::default()
        };
        let ingester = JsonIngester::new(limits);
        // The tail is never parsed, so garbage after the limit is not an error
        let (obs, summary) = run(&ingester, r#"[{"a": 1}, {"a": 2}, {"a": 3}, {"a": 4}, oops"#).unwrap();

        assert_eq!(obs.len(), 2);
        assert_eq!(summary.records_processed, 2);
        assert!(summary.records_truncated);
        assert!(summary.truncated());
    }

    #[test]
    fn test_record_limit_exactly_met_is_not_truncation() {
        let limits = IngestLimits {
            max_records: 2,
            ..Default::default()
        };
        let ingester = JsonIngester::new(limits);
        let (_, summary) = run(&ingester, r#"[{"a": 1}, {"a": 2}]"#).unwrap();
        assert_eq!(summary.records_processed, 2);
        assert!(!summary.records_truncated);
    }

    #[test]
    fn test_malformed_reports_location() {
        let ingester = JsonIngester::new(IngestLimits::default());
        let err = run(&ingester, "{\n  \"a\": 1,\n  \"b\" 2\n}").unwrap_err();
        match err {
            ProfilerError::MalformedInput { format, location, message } => {
                assert_eq!(format, SourceFormat::Json);
                assert!(matches!(location, Location::LineColumn { line: 3, .. }));
                assert!(!message.contains("at line"));
            }
            other => panic!("expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_trailing_garbage_is_malformed() {
        let ingester = JsonIngester::new(IngestLimits::default());
        let err = run(&ingester, r#"{"a": 1} {"#).unwrap_err();
        assert!(err.is_malformed_input());
    }

    #[test]
    fn test_dotted_keys_are_escaped() {
        let ingester = JsonIngester::new(IngestLimits::default());
        let (obs, _) = run(&ingester, r#"{"a.b": 1}"#).unwrap();
        assert_eq!(obs[0].path, "a\\.b");
    }

    #[test]
    fn test_large_unsigned_becomes_float() {
        let ingester = JsonIngester::new(IngestLimits::default());
        let (obs, _) = run(&ingester, r#"{"n": 18446744073709551615}"#).unwrap();
        assert!(matches!(obs[0].value, ObservedValue::Float(_)));
    }

    #[test]
    fn test_scalar_root_has_no_fields() {
        let ingester = JsonIngester::new(IngestLimits::default());
        let (obs, summary) = run(&ingester, "42").unwrap();
        assert!(obs.is_empty());
        assert_eq!(summary.records_processed, 1);
    }

    #[test]
    fn test_json_lines() {
        let ingester = JsonIngester::lines(IngestLimits::default());
        let (obs, summary) = run(&ingester, "{\"a\": 1}\n\n{\"a\": \"x\"}\n").unwrap();
        assert_eq!(paths(&obs), vec!["a", "a"]);
        assert_eq!(summary.records_processed, 2);
    }

    #[test]
    fn test_json_lines_error_reports_line() {
        let ingester = JsonIngester::lines(IngestLimits::default());
        let err = run(&ingester, "{\"a\": 1}\n{\"a\": 2}\n{\"a\": }\n").unwrap_err();
        match err {
            ProfilerError::MalformedInput { format, location, .. } => {
                assert_eq!(format, SourceFormat::JsonLines);
                assert!(matches!(location, Location::LineColumn { line: 3, .. }));
            }
            other => panic!("expected MalformedInput, got {:?}", other),
        }
    }

    #[test]
    fn test_json_lines_record_limit() {
        let limits = IngestLimits {
            max_records: 1,
            ..Default::default()
        };
        let ingester = JsonIngester::lines(limits);
        let (obs, summary) = run(&ingester, "{\"a\": 1}\n{\"a\": 2}\n").unwrap();
        assert_eq!(obs.len(), 1);
        assert!(summary.records_truncated);
    }
}
