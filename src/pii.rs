//! PII detection
//!
//! A field is flagged as personally identifiable by, in order of precedence,
//! its semantic type, a keyword in its name, or the share of its samples that
//! look like social security or credit card numbers.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ProfilerConfig;
use crate::observation::SampleValue;
use crate::semantic::SemanticType;

/// Kind of personal data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiType {
    Email,
    Phone,
    Ssn,
    CreditCard,
    Passport,
    DriversLicense,
    Address,
    IpAddress,
}

impl PiiType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiType::Email => "email",
            PiiType::Phone => "phone",
            PiiType::Ssn => "ssn",
            PiiType::CreditCard => "credit_card",
            PiiType::Passport => "passport",
            PiiType::DriversLicense => "drivers_license",
            PiiType::Address => "address",
            PiiType::IpAddress => "ip_address",
        }
    }
}

impl fmt::Display for PiiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name keywords and what they indicate; `ip_address` precedes `address`
const NAME_INDICATORS: [(&str, PiiType); 11] = [
    ("email", PiiType::Email),
    ("phone", PiiType::Phone),
    ("mobile", PiiType::Phone),
    ("ssn", PiiType::Ssn),
    ("social_security", PiiType::Ssn),
    ("credit_card", PiiType::CreditCard),
    ("passport", PiiType::Passport),
    ("driver_license", PiiType::DriversLicense),
    ("drivers_license", PiiType::DriversLicense),
    ("ip_address", PiiType::IpAddress),
    ("address", PiiType::Address),
];

/// Which signal flagged the field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiSignal {
    SemanticType,
    FieldName,
    Values,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiClassification {
    pub pii_type: PiiType,
    pub signal: PiiSignal,
}

/// Luhn checksum over a card number, ignoring spaces and dashes
pub fn luhn_valid(number: &str) -> bool {
    let digits: Vec<u32> = number
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_digit(10))
        .collect::<Option<_>>()
        .unwrap_or_default();
    if digits.is_empty() {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                doubled / 10 + doubled % 10
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

#[derive(Debug)]
pub struct PiiClassifier {
    threshold: f64,
    ssn: Regex,
    credit_card: Regex,
}

impl Default for PiiClassifier {
    fn default() -> Self {
        Self::new(0.50)
    }
}

impl PiiClassifier {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            ssn: Regex::new(r"^\d{3}-\d{2}-\d{4}$").expect("built-in pattern compiles"),
            credit_card: Regex::new(r"^\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}$")
                .expect("built-in pattern compiles"),
        }
    }

    pub fn from_config(config: &ProfilerConfig) -> Self {
        Self::new(config.classification.pii_match_threshold)
    }

    /// Classify a field, or `None` when it carries no PII signal
    pub fn classify(
        &self,
        field_path: &str,
        field_name: &str,
        semantic_type: Option<SemanticType>,
        samples: &[SampleValue],
    ) -> Option<PiiClassification> {
        let found = self
            .from_semantic_type(semantic_type)
            .or_else(|| from_field_name(field_name))
            .or_else(|| self.from_values(samples));

        if let Some(classification) = found {
            debug!(
                field = field_path,
                pii_type = %classification.pii_type,
                signal = ?classification.signal,
                "flagged PII field"
            );
        }
        found
    }

    fn from_semantic_type(&self, semantic_type: Option<SemanticType>) -> Option<PiiClassification> {
        let pii_type = match semantic_type? {
            SemanticType::Email => PiiType::Email,
            SemanticType::Phone => PiiType::Phone,
            SemanticType::Ssn => PiiType::Ssn,
            SemanticType::CreditCard => PiiType::CreditCard,
            _ => return None,
        };
        Some(PiiClassification {
            pii_type,
            signal: PiiSignal::SemanticType,
        })
    }

    fn from_values(&self, samples: &[SampleValue]) -> Option<PiiClassification> {
        if samples.is_empty() {
            return None;
        }
        let total = samples.len() as f64;
        let share = |test: &dyn Fn(&str) -> bool| {
            samples
                .iter()
                .filter_map(SampleValue::as_str)
                .filter(|v| test(v))
                .count() as f64
                / total
        };

        let pii_type = if share(&|v| self.ssn.is_match(v)) > self.threshold {
            PiiType::Ssn
        } else if share(&|v| self.credit_card.is_match(v) && luhn_valid(v)) > self.threshold {
            PiiType::CreditCard
        } else {
            return None;
        };
        Some(PiiClassification {
            pii_type,
            signal: PiiSignal::Values,
        })
    }
}

fn from_field_name(field_name: &str) -> Option<PiiClassification> {
    let lower = field_name.to_lowercase();
    NAME_INDICATORS
        .iter()
        .find(|(keyword, _)| lower.contains(keyword))
        .map(|(_, pii_type)| PiiClassification {
            pii_type: *pii_type,
            signal: PiiSignal::FieldName,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<SampleValue> {
        values.iter().map(|v| SampleValue::Str(v.to_string())).collect()
    }

    #[test]
    fn test_luhn() {
        assert!(luhn_valid("4532015112830366"));
        assert!(!luhn_valid("4532015112830367"));
        assert!(luhn_valid("4532-0151-1283-0366"));
        assert!(!luhn_valid(""));
        assert!(!luhn_valid("4532x15112830366"));
    }

    #[test]
    fn test_semantic_type_first() {
        let classifier = PiiClassifier::default();
        let result = classifier
            .classify("contact", "contact", Some(SemanticType::Phone), &[])
            .unwrap();
        assert_eq!(result.pii_type, PiiType::Phone);
        assert_eq!(result.signal, PiiSignal::SemanticType);

        assert_eq!(
            classifier.classify("zip", "zip", Some(SemanticType::ZipCode), &[]),
            None
        );
    }

    #[test]
    fn test_name_beats_values() {
        let classifier = PiiClassifier::default();
        let result = classifier
            .classify("user.user_email", "user_email", None, &strings(&["not-an-email"]))
            .unwrap();
        assert_eq!(result.pii_type, PiiType::Email);
        assert_eq!(result.signal, PiiSignal::FieldName);

        let result = classifier
            .classify("notes", "ip_address", None, &strings(&["123-45-6789"]))
            .unwrap();
        assert_eq!(result.pii_type, PiiType::IpAddress);
    }

    #[test]
    fn test_address_indicators() {
        let classifier = PiiClassifier::default();
        let kind = |name: &str| classifier.classify(name, name, None, &[]).map(|c| c.pii_type);
        assert_eq!(kind("billing_address"), Some(PiiType::Address));
        assert_eq!(kind("email_address"), Some(PiiType::Email));
        assert_eq!(kind("client_ip_address"), Some(PiiType::IpAddress));
        assert_eq!(kind("Passport_No"), Some(PiiType::Passport));
        assert_eq!(kind("drivers_license"), Some(PiiType::DriversLicense));
        assert_eq!(kind("comment"), None);
    }

    #[test]
    fn test_value_ratios_are_strict() {
        let classifier = PiiClassifier::default();
        let half = strings(&["123-45-6789", "hello"]);
        assert_eq!(classifier.classify("v", "v", None, &half), None);

        let most = strings(&["123-45-6789", "987-65-4321", "hello"]);
        assert_eq!(
            classifier.classify("v", "v", None, &most).map(|c| c.pii_type),
            Some(PiiType::Ssn)
        );

        let cards = strings(&["4532015112830366", "4532 0151 1283 0366", "4532015112830367"]);
        let result = classifier.classify("v", "v", None, &cards).unwrap();
        assert_eq!(result.pii_type, PiiType::CreditCard);
        assert_eq!(result.signal, PiiSignal::Values);
    }

    #[test]
    fn test_non_string_samples_count_in_denominator() {
        let classifier = PiiClassifier::default();
        let samples = vec![
            SampleValue::Str("123-45-6789".into()),
            SampleValue::Int(1),
            SampleValue::Int(2),
        ];
        assert_eq!(classifier.classify("v", "v", None, &samples), None);
    }
}
