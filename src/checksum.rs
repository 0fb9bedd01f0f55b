//! Schema fingerprints
//!
//! A fingerprint digests only the structure of a field set: each field's path
//! and data type. Records are sorted by path (byte-wise) before hashing, so
//! the key order of the source document never changes the result.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::schema::FieldRecord;

/// Separator between a path and its type
const TYPE_SEPARATOR: char = ':';
/// Separator between records
const RECORD_SEPARATOR: char = '|';
/// Escapes separators that occur inside a path
const ESCAPE: char = '\\';

/// SHA-256 digest, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    pub fn of_text(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The canonical text a fingerprint is computed over
///
/// `path:type` per record, sorted by path, joined with `|`. Separator and
/// escape characters inside a path are backslash-escaped, so distinct field
/// sets never share a canonical form.
pub fn canonical_form(records: &[FieldRecord]) -> String {
    let mut entries: Vec<(&str, &str)> = records
        .iter()
        .map(|r| (r.field_path.as_str(), r.data_type.as_str()))
        .collect();
    entries.sort_unstable();

    let mut canonical = String::new();
    for (i, (path, data_type)) in entries.into_iter().enumerate() {
        if i > 0 {
            canonical.push(RECORD_SEPARATOR);
        }
        push_escaped(&mut canonical, path);
        canonical.push(TYPE_SEPARATOR);
        canonical.push_str(data_type);
    }
    canonical
}

fn push_escaped(out: &mut String, path: &str) {
    for c in path.chars() {
        if c == ESCAPE || c == TYPE_SEPARATOR || c == RECORD_SEPARATOR {
            out.push(ESCAPE);
        }
        out.push(c);
    }
}

/// Structural fingerprint of a field set
pub fn fingerprint(records: &[FieldRecord]) -> Checksum {
    Checksum::of_text(&canonical_form(records))
}
