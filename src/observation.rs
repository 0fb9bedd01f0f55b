//! Observations emitted by document adapters
//!
//! An adapter walks a document and reports every value it meets as an
//! [`Observation`]: the value's field path, a tagged value, its depth and
//! whether it was reached as an array item. Observations are pushed into an
//! [`ObservationSink`] and never buffered by the adapter.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Primitive type tag counted in a field's type histogram
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    Null,
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Object,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Null => "null",
            TypeTag::Boolean => "boolean",
            TypeTag::Integer => "integer",
            TypeTag::Float => "float",
            TypeTag::String => "string",
            TypeTag::Array => "array",
            TypeTag::Object => "object",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value as seen by an adapter
///
/// Containers are reported as markers; their members follow as separate
/// observations at deeper paths.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    ArrayMarker,
    ObjectMarker,
}

impl ObservedValue {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            ObservedValue::Null => TypeTag::Null,
            ObservedValue::Bool(_) => TypeTag::Boolean,
            ObservedValue::Int(_) => TypeTag::Integer,
            ObservedValue::Float(_) => TypeTag::Float,
            ObservedValue::Str(_) => TypeTag::String,
            ObservedValue::ArrayMarker => TypeTag::Array,
            ObservedValue::ObjectMarker => TypeTag::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ObservedValue::Null)
    }

    /// The scalar payload, if this value can be kept as a sample
    pub fn to_sample(&self) -> Option<SampleValue> {
        match self {
            ObservedValue::Bool(b) => Some(SampleValue::Bool(*b)),
            ObservedValue::Int(i) => Some(SampleValue::Int(*i)),
            ObservedValue::Float(f) => Some(SampleValue::Float(*f)),
            ObservedValue::Str(s) => Some(SampleValue::Str(s.clone())),
            ObservedValue::Null | ObservedValue::ArrayMarker | ObservedValue::ObjectMarker => None,
        }
    }

    /// Numeric payload for statistics
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ObservedValue::Int(i) => Some(*i as f64),
            ObservedValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Stable 64-bit digest of a scalar value, used for distinct counting
    pub fn value_hash(&self) -> Option<u64> {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        match self {
            ObservedValue::Bool(b) => (0u8, b).hash(&mut hasher),
            ObservedValue::Int(i) => (1u8, i).hash(&mut hasher),
            ObservedValue::Float(f) => (2u8, f.to_bits()).hash(&mut hasher),
            ObservedValue::Str(s) => (3u8, s.as_str()).hash(&mut hasher),
            ObservedValue::Null | ObservedValue::ArrayMarker | ObservedValue::ObjectMarker => {
                return None
            }
        }
        Some(hasher.finish())
    }
}

/// A stored sample value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl SampleValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SampleValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Int(i) => Some(*i as f64),
            SampleValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Bool(b) => write!(f, "{}", b),
            SampleValue::Int(i) => write!(f, "{}", i),
            SampleValue::Float(x) => write!(f, "{}", x),
            SampleValue::Str(s) => f.write_str(s),
        }
    }
}

/// One value reported by an adapter
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Field path (see [`crate::path`])
    pub path: String,
    pub value: ObservedValue,
    /// Container depth; members of a record's root are at depth 0
    pub depth: usize,
    /// Reached as an element of a repeated container
    pub is_array_item: bool,
}

impl Observation {
    pub fn new(path: impl Into<String>, value: ObservedValue, depth: usize) -> Self {
        Self {
            path: path.into(),
            value,
            depth,
            is_array_item: false,
        }
    }

    pub fn array_item(path: impl Into<String>, value: ObservedValue, depth: usize) -> Self {
        Self {
            path: path.into(),
            value,
            depth,
            is_array_item: true,
        }
    }
}

/// Consumer of an observation stream
pub trait ObservationSink {
    fn observe(&mut self, observation: Observation);
}

impl ObservationSink for Vec<Observation> {
    fn observe(&mut self, observation: Observation) {
        self.push(observation);
    }
}
