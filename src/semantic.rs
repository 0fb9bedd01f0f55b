//! Semantic classification
//!
//! Assigns a business meaning to a field. String fields are classified by
//! their sample values first: every tested sample counts toward the first
//! category whose test it passes, and a category wins once its share of
//! tested samples reaches the threshold. When no category wins, the field
//! name decides. Numeric fields are classified by name only.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ProfilerConfig;
use crate::inference::DataType;
use crate::observation::SampleValue;
use crate::pii::luhn_valid;

/// Inferred meaning of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Email,
    Phone,
    Url,
    Uuid,
    Date,
    ZipCode,
    Currency,
    Ssn,
    CreditCard,
    Identifier,
    Name,
    Category,
    Count,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Email => "email",
            SemanticType::Phone => "phone",
            SemanticType::Url => "url",
            SemanticType::Uuid => "uuid",
            SemanticType::Date => "date",
            SemanticType::ZipCode => "zip_code",
            SemanticType::Currency => "currency",
            SemanticType::Ssn => "ssn",
            SemanticType::CreditCard => "credit_card",
            SemanticType::Identifier => "identifier",
            SemanticType::Name => "name",
            SemanticType::Category => "category",
            SemanticType::Count => "count",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories recognizable from values, in test order
const VALUE_ORDER: [SemanticType; 10] = [
    SemanticType::Email,
    SemanticType::Phone,
    SemanticType::Url,
    SemanticType::Uuid,
    SemanticType::Date,
    SemanticType::ZipCode,
    SemanticType::Currency,
    SemanticType::Ssn,
    SemanticType::CreditCard,
    SemanticType::Identifier,
];

/// Accepted date layouts, tried in order
const DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.fZ",
];
const DAY_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// What decided a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Values,
    FieldName,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SemanticClassification {
    pub semantic_type: SemanticType,
    /// Share of tested samples in this category, 0-1
    pub match_ratio: f64,
    pub source: ClassificationSource,
}

/// Value- and name-based semantic classifier
#[derive(Debug)]
pub struct SemanticClassifier {
    threshold: f64,
    samples_tested: usize,
    email: Regex,
    phone: Regex,
    url: Regex,
    uuid: Regex,
    zip_code: Regex,
    ssn: Regex,
    credit_card: Regex,
    identifier: Regex,
}

impl Default for SemanticClassifier {
    fn default() -> Self {
        Self::new(0.70, 10)
    }
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("built-in pattern compiles")
}

impl SemanticClassifier {
    pub fn new(threshold: f64, samples_tested: usize) -> Self {
        Self {
            threshold,
            samples_tested,
            email: pattern(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$"),
            phone: pattern(r"^\+?1?[\s.-]?\(?[0-9]{3}\)?[\s.-]?[0-9]{3}[\s.-]?[0-9]{4}$"),
            url: pattern(r"^https?://\S+$"),
            uuid: pattern(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$"),
            zip_code: pattern(r"^\d{5}(-\d{4})?$"),
            ssn: pattern(r"^(?:\d{3}-\d{2}-\d{4}|\d{9})$"),
            credit_card: pattern(r"^\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}$"),
            identifier: pattern(r"^[a-zA-Z0-9_-]+$"),
        }
    }

    pub fn from_config(config: &ProfilerConfig) -> Self {
        Self::new(
            config.classification.semantic_match_threshold,
            config.classification.semantic_samples_tested,
        )
    }

    /// Classify a field, or `None` when nothing is conclusive
    pub fn classify(
        &self,
        field_name: &str,
        samples: &[SampleValue],
        data_type: DataType,
    ) -> Option<SemanticClassification> {
        match data_type {
            DataType::String => self.classify_strings(field_name, samples),
            DataType::Integer | DataType::Float => {
                numeric_name_hint(field_name).map(|semantic_type| SemanticClassification {
                    semantic_type,
                    match_ratio: 0.0,
                    source: ClassificationSource::FieldName,
                })
            }
            _ => None,
        }
    }

    fn classify_strings(&self, field_name: &str, samples: &[SampleValue]) -> Option<SemanticClassification> {
        let mut counts = [0usize; VALUE_ORDER.len()];
        let mut tested = 0usize;

        for value in samples.iter().take(self.samples_tested).filter_map(SampleValue::as_str) {
            tested += 1;
            if let Some(i) = VALUE_ORDER.iter().position(|t| self.value_matches(*t, field_name, value)) {
                counts[i] += 1;
            }
        }

        let ratio = |i: usize| {
            if tested == 0 {
                0.0
            } else {
                counts[i] as f64 / tested as f64
            }
        };

        if tested > 0 {
            for (i, semantic_type) in VALUE_ORDER.iter().enumerate() {
                let match_ratio = ratio(i);
                if match_ratio >= self.threshold {
                    return Some(SemanticClassification {
                        semantic_type: *semantic_type,
                        match_ratio,
                        source: ClassificationSource::Values,
                    });
                }
            }
        }

        name_hint(field_name).map(|semantic_type| {
            let match_ratio = VALUE_ORDER
                .iter()
                .position(|t| *t == semantic_type)
                .map(ratio)
                .unwrap_or(0.0);
            SemanticClassification {
                semantic_type,
                match_ratio,
                source: ClassificationSource::FieldName,
            }
        })
    }

    fn value_matches(&self, semantic_type: SemanticType, field_name: &str, value: &str) -> bool {
        match semantic_type {
            SemanticType::Email => self.email.is_match(value),
            SemanticType::Phone => self.phone.is_match(value),
            SemanticType::Url => self.url.is_match(value),
            SemanticType::Uuid => self.uuid.is_match(value),
            SemanticType::Date => is_date(value),
            SemanticType::ZipCode => self.zip_code.is_match(value),
            SemanticType::Currency => is_currency(value),
            SemanticType::Ssn => self.ssn.is_match(value),
            SemanticType::CreditCard => self.credit_card.is_match(value) && luhn_valid(value),
            SemanticType::Identifier => is_id_name(field_name) && self.identifier.is_match(value),
            SemanticType::Name | SemanticType::Category | SemanticType::Count => false,
        }
    }
}

/// Whether `value` parses under one of the accepted date layouts
pub fn is_date(value: &str) -> bool {
    DAY_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
        || DATE_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
}

fn is_currency(value: &str) -> bool {
    value.starts_with(CURRENCY_SYMBOLS) && value.chars().any(|c| c.is_ascii_digit())
}

fn is_id_name(field_name: &str) -> bool {
    field_name.ends_with("_id")
        || field_name.ends_with("Id")
        || field_name == "id"
        || field_name.to_lowercase().contains("identifier")
}

fn has_token(lower: &str, token: &str) -> bool {
    lower.split(|c: char| !c.is_ascii_alphanumeric()).any(|t| t == token)
}

fn contains_any(lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| lower.contains(k))
}

/// Category suggested by the field name alone
pub fn name_hint(field_name: &str) -> Option<SemanticType> {
    let lower = field_name.to_lowercase();

    if lower.contains("email") {
        Some(SemanticType::Email)
    } else if contains_any(&lower, &["ssn", "social_security"]) {
        Some(SemanticType::Ssn)
    } else if lower.contains("credit_card") || (lower.contains("card") && lower.contains("last")) {
        Some(SemanticType::CreditCard)
    } else if contains_any(&lower, &["phone", "mobile"]) || has_token(&lower, "tel") {
        Some(SemanticType::Phone)
    } else if contains_any(&lower, &["url", "link", "website"]) {
        Some(SemanticType::Url)
    } else if contains_any(&lower, &["date", "time"]) || lower.ends_with("_at") {
        Some(SemanticType::Date)
    } else if contains_any(&lower, &["zip", "postal"]) {
        Some(SemanticType::ZipCode)
    } else if contains_any(&lower, &["price", "amount", "cost"]) {
        Some(SemanticType::Currency)
    } else if is_id_name(field_name) {
        Some(SemanticType::Identifier)
    } else if contains_any(&lower, &["name", "title", "label"]) {
        Some(SemanticType::Name)
    } else if contains_any(&lower, &["status", "type", "category", "tier", "level"]) {
        Some(SemanticType::Category)
    } else {
        None
    }
}

fn numeric_name_hint(field_name: &str) -> Option<SemanticType> {
    let lower = field_name.to_lowercase();
    if contains_any(
        &lower,
        &["price", "cost", "amount", "balance", "revenue", "total", "payment"],
    ) {
        Some(SemanticType::Currency)
    } else if contains_any(&lower, &["zip", "postal"]) {
        Some(SemanticType::ZipCode)
    } else if is_id_name(field_name) {
        Some(SemanticType::Identifier)
    } else if contains_any(&lower, &["count", "quantity", "qty", "number_of"]) {
        Some(SemanticType::Count)
    } else {
        None
    }
}
