//! XML adapter
//!
//! Reads the document as an event stream. Children of the document element
//! are records; a document element without element children is itself the
//! only record. Elements with element children are objects, text leaves are
//! strings and empty elements are null. Attributes become child fields named
//! `<prefix><name>`. A tag repeated under the same parent is reported as an
//! array item from its second occurrence on.

use std::collections::HashMap;
use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;
use tracing::trace;

use super::{IngestLimits, IngestSummary, SourceFormat, StreamIngester};
use crate::error::{Location, ProfilerError, Result};
use crate::observation::{Observation, ObservationSink, ObservedValue};
use crate::path::child_path;

/// Streaming XML adapter
#[derive(Debug, Clone)]
pub struct XmlIngester {
    limits: IngestLimits,
    strip_namespaces: bool,
    attribute_prefix: String,
}

impl XmlIngester {
    pub fn new(limits: IngestLimits, strip_namespaces: bool, attribute_prefix: impl Into<String>) -> Self {
        Self {
            limits,
            strip_namespaces,
            attribute_prefix: attribute_prefix.into(),
        }
    }

    fn qualified(&self, name: QName<'_>) -> String {
        let bytes = if self.strip_namespaces {
            name.local_name().into_inner()
        } else {
            name.into_inner()
        };
        String::from_utf8_lossy(bytes).into_owned()
    }
}

impl StreamIngester for XmlIngester {
    fn format(&self) -> SourceFormat {
        SourceFormat::Xml
    }

    fn ingest(&self, reader: &mut dyn BufRead, sink: &mut dyn ObservationSink) -> Result<IngestSummary> {
        let mut xml = Reader::from_reader(reader);
        xml.config_mut().trim_text(true);

        let mut walk = XmlWalk {
            ingester: self,
            sink,
            summary: IngestSummary::default(),
            stack: Vec::new(),
            seen_root: false,
        };
        let mut buf = Vec::new();
        let mut skip_buf = Vec::new();

        loop {
            let event = xml
                .read_event_into(&mut buf)
                .map_err(|e| xml_error(xml.buffer_position() as u64, e))?;

            match event {
                Event::Start(start) => match walk.open(&start, xml.buffer_position() as u64)? {
                    Open::Entered => {}
                    Open::Skip => {
                        let name = start.name().as_ref().to_vec();
                        xml.read_to_end_into(QName(&name), &mut skip_buf)
                            .map_err(|e| xml_error(xml.buffer_position() as u64, e))?;
                        skip_buf.clear();
                    }
                    Open::Stop => break,
                },
                Event::Empty(start) => match walk.open(&start, xml.buffer_position() as u64)? {
                    Open::Entered => walk.close(),
                    Open::Skip => {}
                    Open::Stop => break,
                },
                Event::End(_) => walk.close(),
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| xml_error(xml.buffer_position() as u64, e))?;
                    walk.text(&text);
                }
                Event::CData(data) => walk.text(&String::from_utf8_lossy(&data)),
                Event::Eof => {
                    let position = xml.buffer_position() as u64;
                    if !walk.stack.is_empty() {
                        return Err(malformed(position, "unexpected end of document"));
                    }
                    if !walk.seen_root {
                        return Err(malformed(position, "no root element"));
                    }
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(walk.summary)
    }
}

fn malformed(offset: u64, message: impl Into<String>) -> ProfilerError {
    ProfilerError::malformed(SourceFormat::Xml, Location::ByteOffset { offset }, message)
}

fn xml_error(offset: u64, e: impl Into<quick_xml::Error>) -> ProfilerError {
    match e.into() {
        quick_xml::Error::Io(io) => ProfilerError::Io(std::io::Error::new(io.kind(), io.to_string())),
        other => malformed(offset, other.to_string()),
    }
}

// =============================================================================
// Walk state
// =============================================================================

enum Open {
    /// Element pushed; its end event will close it
    Entered,
    /// Element not observed; its subtree must be consumed
    Skip,
    /// Record limit reached
    Stop,
}

/// An open element
struct Frame {
    path: String,
    depth: usize,
    is_array_item: bool,
    /// Document element (records are its children)
    is_root: bool,
    child_counts: HashMap<String, usize>,
    /// Own observation already emitted (as an object)
    emitted: bool,
    text: String,
    /// Attribute observations, flushed right after the element's own
    pending_attributes: Vec<Observation>,
}

impl Frame {
    fn new(path: String, depth: usize, is_array_item: bool, is_root: bool) -> Self {
        Self {
            path,
            depth,
            is_array_item,
            is_root,
            child_counts: HashMap::new(),
            emitted: false,
            text: String::new(),
            pending_attributes: Vec::new(),
        }
    }
}

struct XmlWalk<'a, 's> {
    ingester: &'a XmlIngester,
    sink: &'s mut dyn ObservationSink,
    summary: IngestSummary,
    stack: Vec<Frame>,
    seen_root: bool,
}

impl<'a, 's> XmlWalk<'a, 's> {
    fn limits(&self) -> IngestLimits {
        self.ingester.limits
    }

    /// Emit `frame`'s own observation followed by its attributes
    fn emit_frame(sink: &mut dyn ObservationSink, frame: &mut Frame, value: ObservedValue) {
        sink.observe(Observation {
            path: frame.path.clone(),
            value,
            depth: frame.depth,
            is_array_item: frame.is_array_item,
        });
        for attribute in frame.pending_attributes.drain(..) {
            sink.observe(attribute);
        }
    }

    fn open(&mut self, start: &BytesStart<'_>, position: u64) -> Result<Open> {
        let tag = self.ingester.qualified(start.name());
        let limits = self.limits();

        let (path, depth, is_array_item) = match self.stack.last_mut() {
            None => {
                self.seen_root = true;
                let path = child_path("", &tag);
                let mut frame = Frame::new(path, 0, false, true);
                frame.pending_attributes = self.attributes(start, &frame.path, 0, position)?;
                self.stack.push(frame);
                return Ok(Open::Entered);
            }
            Some(parent) if parent.is_root => {
                // The document element is a collection; this child is a record
                if self.summary.records_processed >= limits.max_records {
                    self.summary.records_truncated = true;
                    return Ok(Open::Stop);
                }
                self.summary.records_processed += 1;
                parent.emitted = true;
                parent.pending_attributes.clear();
                (child_path("", &tag), 0, false)
            }
            Some(parent) => {
                if !parent.emitted {
                    parent.emitted = true;
                    Self::emit_frame(&mut *self.sink, parent, ObservedValue::ObjectMarker);
                }
                let occurrence = parent.child_counts.entry(tag.clone()).or_insert(0);
                *occurrence += 1;
                let occurrence = *occurrence;
                let path = child_path(&parent.path, &tag);
                let depth = parent.depth + 1;

                if occurrence > limits.max_array_items {
                    self.summary.array_items_skipped += 1;
                    return Ok(Open::Skip);
                }
                if depth > limits.max_depth {
                    trace!(path = %path, max_depth = limits.max_depth, "pruned subtree");
                    self.summary.depth_pruned += 1;
                    return Ok(Open::Skip);
                }
                (path, depth, occurrence >= 2)
            }
        };

        let mut frame = Frame::new(path, depth, is_array_item, false);
        frame.pending_attributes = self.attributes(start, &frame.path, depth, position)?;
        self.stack.push(frame);
        Ok(Open::Entered)
    }

    fn attributes(
        &mut self,
        start: &BytesStart<'_>,
        element_path: &str,
        element_depth: usize,
        position: u64,
    ) -> Result<Vec<Observation>> {
        let depth = element_depth + 1;
        let mut observations = Vec::new();

        for attribute in start.attributes() {
            let attribute = attribute.map_err(|e| xml_error(position, e))?;
            let key = attribute.key.as_ref();
            if key == b"xmlns" || key.starts_with(b"xmlns:") {
                continue;
            }
            let name = format!(
                "{}{}",
                self.ingester.attribute_prefix,
                self.ingester.qualified(attribute.key)
            );
            let path = child_path(element_path, &name);
            if depth > self.limits().max_depth {
                trace!(path = %path, "pruned attribute");
                self.summary.depth_pruned += 1;
                continue;
            }
            let value = attribute
                .unescape_value()
                .map_err(|e| xml_error(position, e))?;
            let value = if value.trim().is_empty() {
                ObservedValue::Null
            } else {
                ObservedValue::Str(value.into_owned())
            };
            observations.push(Observation::new(path, value, depth));
        }
        Ok(observations)
    }

    fn text(&mut self, text: &str) {
        if let Some(frame) = self.stack.last_mut() {
            if !frame.emitted {
                frame.text.push_str(text);
            }
        }
    }

    fn close(&mut self) {
        let Some(mut frame) = self.stack.pop() else {
            return;
        };
        if frame.emitted {
            return;
        }
        if frame.is_root {
            // No element children: the document element is the only record
            self.summary.records_processed = 1;
        }
        let text = frame.text.trim();
        let value = if text.is_empty() {
            ObservedValue::Null
        } else {
            ObservedValue::Str(text.to_string())
        };
        Self::emit_frame(&mut *self.sink, &mut frame, value);
    }
}
