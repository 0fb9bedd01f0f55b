//! Primary type inference
//!
//! A field's type is read off its type histogram. Nulls never lower the
//! confidence of a typed field, and integers count as floats when both occur.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::observation::TypeTag;

/// Inferred data type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Nothing but nulls were observed
    Unknown,
    Boolean,
    Integer,
    Float,
    String,
    Array,
    Object,
    /// Array items of more than one type
    Mixed,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Unknown => "unknown",
            DataType::Boolean => "boolean",
            DataType::Integer => "integer",
            DataType::Float => "float",
            DataType::String => "string",
            DataType::Array => "array",
            DataType::Object => "object",
            DataType::Mixed => "mixed",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TypeTag> for DataType {
    fn from(tag: TypeTag) -> Self {
        match tag {
            TypeTag::Null => DataType::Unknown,
            TypeTag::Boolean => DataType::Boolean,
            TypeTag::Integer => DataType::Integer,
            TypeTag::Float => DataType::Float,
            TypeTag::String => DataType::String,
            TypeTag::Array => DataType::Array,
            TypeTag::Object => DataType::Object,
        }
    }
}

/// Count of observations per type tag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeHistogram(BTreeMap<TypeTag, u64>);

impl TypeHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tag: TypeTag) {
        *self.0.entry(tag).or_insert(0) += 1;
    }

    pub fn count(&self, tag: TypeTag) -> u64 {
        self.0.get(&tag).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeTag, u64)> + '_ {
        self.0.iter().map(|(tag, count)| (*tag, *count))
    }
}

impl FromIterator<(TypeTag, u64)> for TypeHistogram {
    fn from_iter<I: IntoIterator<Item = (TypeTag, u64)>>(iter: I) -> Self {
        let mut histogram = TypeHistogram::new();
        for (tag, count) in iter {
            *histogram.0.entry(tag).or_insert(0) += count;
        }
        histogram
    }
}

/// Result of type inference
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TypeInference {
    pub data_type: DataType,
    /// Share of non-null observations agreeing with `data_type`, 0-100
    pub confidence: f64,
}

impl TypeInference {
    fn unknown() -> Self {
        Self {
            data_type: DataType::Unknown,
            confidence: 0.0,
        }
    }
}

/// Winner order when two tags are equally frequent
const TIE_BREAK: [TypeTag; 6] = [
    TypeTag::String,
    TypeTag::Float,
    TypeTag::Integer,
    TypeTag::Boolean,
    TypeTag::Object,
    TypeTag::Array,
];

/// Infer a field's primary type and confidence from its histogram
pub fn infer(histogram: &TypeHistogram) -> TypeInference {
    let non_null: u64 = histogram
        .iter()
        .filter(|(tag, _)| *tag != TypeTag::Null)
        .map(|(_, count)| count)
        .sum();
    if non_null == 0 {
        return TypeInference::unknown();
    }

    let integers = histogram.count(TypeTag::Integer);
    let floats = histogram.count(TypeTag::Float);
    if integers > 0 && floats > 0 {
        return TypeInference {
            data_type: DataType::Float,
            confidence: (integers + floats) as f64 / non_null as f64 * 100.0,
        };
    }

    let mut best: Option<(TypeTag, u64)> = None;
    for tag in TIE_BREAK {
        let count = histogram.count(tag);
        if count > best.map(|(_, c)| c).unwrap_or(0) {
            best = Some((tag, count));
        }
    }

    match best {
        Some((tag, count)) => TypeInference {
            data_type: tag.into(),
            confidence: count as f64 / non_null as f64 * 100.0,
        },
        None => TypeInference::unknown(),
    }
}

/// Type of an array's items from the tags seen on them
pub fn infer_array_item_type(tags: &BTreeSet<TypeTag>) -> DataType {
    let typed: BTreeSet<TypeTag> = tags.iter().copied().filter(|t| *t != TypeTag::Null).collect();
    let mut iter = typed.iter();
    match (iter.next(), iter.next(), iter.next()) {
        (None, _, _) => DataType::Unknown,
        (Some(tag), None, _) => (*tag).into(),
        (Some(TypeTag::Integer), Some(TypeTag::Float), None) => DataType::Float,
        _ => DataType::Mixed,
    }
}
