//! Configuration for schema profiling
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (profiler.toml)
//! - Environment variables (PROFILER__<SECTION>__<KEY>)
//!
//! ## Example config file (profiler.toml):
//! ```toml
//! [analysis]
//! max_depth = 10
//! max_sample_values_per_field = 10
//! max_array_items_sampled = 10
//! max_records_to_analyze = 10000
//!
//! [classification]
//! semantic_match_threshold = 0.7
//! pii_match_threshold = 0.5
//!
//! [xml]
//! strip_namespaces = true
//! attribute_prefix = "@"
//! ```

use std::path::PathBuf;

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::{ProfilerError, Result};

/// Main configuration for the profiler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Traversal and accumulation limits
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Classifier thresholds
    #[serde(default)]
    pub classification: ClassificationConfig,

    /// XML adapter settings
    #[serde(default)]
    pub xml: XmlConfig,
}

/// Limits applied while reading a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Deepest nesting level that is observed
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Distinct sample values kept per field
    #[serde(default = "default_ten")]
    pub max_sample_values_per_field: usize,

    /// Items observed per array occurrence
    #[serde(default = "default_ten")]
    pub max_array_items_sampled: usize,

    /// Records read before analysis stops
    #[serde(default = "default_max_records")]
    pub max_records_to_analyze: u64,

    /// Numeric values kept per field for distribution statistics
    #[serde(default = "default_max_numeric_samples")]
    pub max_numeric_samples: usize,

    /// Distinct values counted per field before the count saturates
    #[serde(default = "default_max_distinct")]
    pub max_distinct_values_tracked: usize,

    /// Finalize fields on the rayon pool
    #[serde(default = "default_true")]
    pub parallel_finalize: bool,
}

/// Classifier thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Share of samples that must agree on a semantic type
    #[serde(default = "default_semantic_threshold")]
    pub semantic_match_threshold: f64,

    /// Share of samples that must look like PII (exclusive)
    #[serde(default = "default_pii_threshold")]
    pub pii_match_threshold: f64,

    /// Samples tested by the semantic classifier
    #[serde(default = "default_ten")]
    pub semantic_samples_tested: usize,
}

/// XML adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XmlConfig {
    /// Drop namespace prefixes from element and attribute names
    #[serde(default = "default_true")]
    pub strip_namespaces: bool,

    /// Prefix for attribute field names
    #[serde(default = "default_attribute_prefix")]
    pub attribute_prefix: String,
}

// Default value functions
fn default_max_depth() -> usize {
    10
}

fn default_ten() -> usize {
    10
}

fn default_max_records() -> u64 {
    10_000
}

fn default_max_numeric_samples() -> usize {
    1_000
}

fn default_max_distinct() -> usize {
    100_000
}

fn default_true() -> bool {
    true
}

fn default_semantic_threshold() -> f64 {
    0.70
}

fn default_pii_threshold() -> f64 {
    0.50
}

fn default_attribute_prefix() -> String {
    "@".to_string()
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_sample_values_per_field: default_ten(),
            max_array_items_sampled: default_ten(),
            max_records_to_analyze: default_max_records(),
            max_numeric_samples: default_max_numeric_samples(),
            max_distinct_values_tracked: default_max_distinct(),
            parallel_finalize: true,
        }
    }
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            semantic_match_threshold: default_semantic_threshold(),
            pii_match_threshold: default_pii_threshold(),
            semantic_samples_tested: default_ten(),
        }
    }
}

impl Default for XmlConfig {
    fn default() -> Self {
        Self {
            strip_namespaces: true,
            attribute_prefix: default_attribute_prefix(),
        }
    }
}

/// Deepest `max_depth` accepted; JSON parsing refuses nesting past 128 levels
pub const MAX_SUPPORTED_DEPTH: usize = 100;

fn invalid(message: impl Into<String>) -> ProfilerError {
    ProfilerError::InvalidConfig(message.into())
}

impl ProfilerConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["profiler.toml", ".profiler.toml", "config/profiler.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(xdg_config) = Self::user_config_path() {
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // PROFILER__ANALYSIS__MAX_DEPTH=4
        builder = builder.add_source(
            Environment::with_prefix("PROFILER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Per-user config file location
    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("io", "schema-profiler", "schema-profiler")
            .map(|dirs| dirs.config_dir().join("profiler.toml"))
    }

    /// Check every limit and threshold
    pub fn validate(&self) -> Result<()> {
        let analysis = &self.analysis;
        let caps = [
            ("analysis.max_sample_values_per_field", analysis.max_sample_values_per_field),
            ("analysis.max_array_items_sampled", analysis.max_array_items_sampled),
            ("analysis.max_numeric_samples", analysis.max_numeric_samples),
            ("analysis.max_distinct_values_tracked", analysis.max_distinct_values_tracked),
            ("classification.semantic_samples_tested", self.classification.semantic_samples_tested),
        ];
        for (name, value) in caps {
            if value == 0 {
                return Err(invalid(format!("{} must be at least 1", name)));
            }
        }
        if analysis.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(invalid(format!(
                "analysis.max_depth must be at most {}, got {}",
                MAX_SUPPORTED_DEPTH, analysis.max_depth
            )));
        }
        if analysis.max_records_to_analyze == 0 {
            return Err(invalid("analysis.max_records_to_analyze must be at least 1"));
        }

        let thresholds = [
            ("classification.semantic_match_threshold", self.classification.semantic_match_threshold),
            ("classification.pii_match_threshold", self.classification.pii_match_threshold),
        ];
        for (name, value) in thresholds {
            if !(value > 0.0 && value <= 1.0) {
                return Err(invalid(format!("{} must be in (0, 1], got {}", name, value)));
            }
        }

        let prefix = &self.xml.attribute_prefix;
        if prefix.is_empty() || prefix.chars().any(|c| matches!(c, '.' | '[' | ']' | '\\')) {
            return Err(invalid(format!(
                "xml.attribute_prefix must be non-empty and free of path characters, got {:?}",
                prefix
            )));
        }
        Ok(())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
