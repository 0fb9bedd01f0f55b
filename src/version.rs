//! Schema versioning
//!
//! Suggests the next semantic version of a schema from the diff against its
//! previous snapshot.

use std::fmt;

use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::compatibility::{ChangeType, SchemaDiff};

/// How far a schema version must move
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionBump {
    /// Same schema
    None,
    /// Compatible attribute changes only
    Patch,
    /// New fields, nothing breaking
    Minor,
    /// At least one breaking change
    Major,
}

impl VersionBump {
    pub fn from_diff(diff: &SchemaDiff) -> Self {
        if diff.is_breaking() {
            VersionBump::Major
        } else if diff.changes_of(ChangeType::Added).next().is_some() {
            VersionBump::Minor
        } else if diff.has_changes() {
            VersionBump::Patch
        } else {
            VersionBump::None
        }
    }
}

impl fmt::Display for VersionBump {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VersionBump::None => "none",
            VersionBump::Patch => "patch",
            VersionBump::Minor => "minor",
            VersionBump::Major => "major",
        };
        f.write_str(s)
    }
}

/// A schema version with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Semantic version (e.g., "1.2.3")
    pub version: Version,
    /// Fingerprint of the schema at this version
    pub schema_hash: Option<Checksum>,
    /// When this version was created
    pub created_at: DateTime<Utc>,
    /// Previous version, if this one was derived
    pub previous_version: Option<String>,
}

impl SchemaVersion {
    pub fn new(version: Version) -> Self {
        Self {
            version,
            schema_hash: None,
            created_at: Utc::now(),
            previous_version: None,
        }
    }

    /// Create from a version string, with or without a leading `v`
    pub fn parse(version_str: &str) -> Result<Self, semver::Error> {
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        let version = Version::parse(version_str)?;
        Ok(Self::new(version))
    }

    /// Attach the fingerprint of the schema this version describes
    pub fn with_hash(mut self, schema_hash: Checksum) -> Self {
        self.schema_hash = Some(schema_hash);
        self
    }

    /// Get the version string (e.g., "1.2.3")
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    fn derive(&self, version: Version) -> Self {
        Self {
            version,
            schema_hash: None,
            created_at: Utc::now(),
            previous_version: Some(self.version_string()),
        }
    }

    pub fn bump_major(&self) -> Self {
        self.derive(Version::new(self.version.major + 1, 0, 0))
    }

    pub fn bump_minor(&self) -> Self {
        self.derive(Version::new(self.version.major, self.version.minor + 1, 0))
    }

    pub fn bump_patch(&self) -> Self {
        self.derive(Version::new(
            self.version.major,
            self.version.minor,
            self.version.patch + 1,
        ))
    }

    /// Apply a bump; `None` keeps the version
    pub fn next(&self, bump: VersionBump) -> Self {
        match bump {
            VersionBump::None => self.clone(),
            VersionBump::Patch => self.bump_patch(),
            VersionBump::Minor => self.bump_minor(),
            VersionBump::Major => self.bump_major(),
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.version)
    }
}

impl PartialEq for SchemaVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for SchemaVersion {}

impl PartialOrd for SchemaVersion {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SchemaVersion {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.version.cmp(&other.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compatibility::SchemaDiffer;
    use crate::inference::DataType;
    use crate::ingest::{IngestSummary, SourceFormat};
    use crate::schema::{FieldRecord, SchemaSnapshot};

    fn snapshot(fields: &[(&str, DataType)]) -> SchemaSnapshot {
        let records = fields
            .iter()
            .map(|(path, data_type)| FieldRecord::for_test(path, *data_type))
            .collect();
        SchemaSnapshot::new(SourceFormat::Json, records, IngestSummary::default())
    }

    fn bump(old: &[(&str, DataType)], new: &[(&str, DataType)]) -> VersionBump {
        let diff = SchemaDiffer::new().diff(&snapshot(old), &snapshot(new));
        VersionBump::from_diff(&diff)
    }

    #[test]
    fn test_version_with_v_prefix() {
        let v = SchemaVersion::parse("v1.2.3").unwrap();
        assert_eq!(v.version_string(), "1.2.3");
        assert_eq!(v.to_string(), "v1.2.3");
    }

    #[test]
    fn test_next_version_takes_new_hash() {
        let new = snapshot(&[("a", DataType::String)]);
        let base = SchemaVersion::parse("1.0.0")
            .unwrap()
            .with_hash(Checksum::of_text("old"));
        let next = base.next(VersionBump::Minor).with_hash(new.schema_hash().clone());
        assert_eq!(next.version_string(), "1.1.0");
        assert_eq!(next.schema_hash.as_ref(), Some(new.schema_hash()));
        assert_eq!(next.previous_version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn test_bump_from_diff() {
        let base = [("a", DataType::String)];
        assert_eq!(bump(&base, &base), VersionBump::None);
        assert_eq!(
            bump(&base, &[("a", DataType::String), ("b", DataType::Integer)]),
            VersionBump::Minor
        );
        assert_eq!(bump(&base, &[("a", DataType::Integer)]), VersionBump::Major);
        assert_eq!(bump(&base, &[]), VersionBump::Major);
    }

    #[test]
    fn test_compatible_modification_is_patch() {
        let old = snapshot(&[("a", DataType::String)]);
        let mut widened = FieldRecord::for_test("a", DataType::String);
        widened.is_nullable = true;
        let new = SchemaSnapshot::new(SourceFormat::Json, vec![widened], IngestSummary::default());
        let diff = SchemaDiffer::new().diff(&old, &new);
        assert_eq!(VersionBump::from_diff(&diff), VersionBump::Patch);
    }

    #[test]
    fn test_next_version() {
        let v = SchemaVersion::parse("1.2.3").unwrap();
        assert_eq!(v.next(VersionBump::Major).version_string(), "2.0.0");
        assert_eq!(v.next(VersionBump::Minor).version_string(), "1.3.0");
        let patch = v.next(VersionBump::Patch);
        assert_eq!(patch.version_string(), "1.2.4");
        assert_eq!(patch.previous_version.as_deref(), Some("1.2.3"));
        assert_eq!(v.next(VersionBump::None), v);
    }
}
