//! Scan result structure.

use crate::core::types::{FileHash, FileMetadata, ScanOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The complete result of a scan operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    /// Unique identifier for this scan.
    pub id: String,

    /// The outcome of the scan.
    pub outcome: ScanOutcome,

    /// Metadata about the scanned content.
    pub file_metadata: FileMetadata,

    /// Name of the engine that performed the scan.
    pub engine: String,

    /// Version of the engine's signature database, if known.
    pub engine_version: Option<String>,

    /// When the scan started.
    pub started_at: DateTime<Utc>,

    /// When the scan completed.
    pub completed_at: DateTime<Utc>,

    /// How long the scan took.
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl ScanResult {
    /// Creates a new `ScanResult` with the given outcome.
    pub fn new(
        outcome: ScanOutcome,
        file_metadata: FileMetadata,
        engine: impl Into<String>,
        duration: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            outcome,
            file_metadata,
            engine: engine.into(),
            engine_version: None,
            started_at: now - chrono::Duration::from_std(duration).unwrap_or_default(),
            completed_at: now,
            duration,
        }
    }

    /// Returns `true` if the content is clean.
    pub fn is_clean(&self) -> bool {
        self.outcome.is_clean()
    }

    /// Returns `true` if the content is infected.
    pub fn is_infected(&self) -> bool {
        self.outcome.is_infected()
    }

    /// Returns the detected virus name, if any.
    pub fn virus(&self) -> Option<&str> {
        self.outcome.virus()
    }

    /// The text an interpreter command returns for this result:
    /// the virus name, or an empty string when clean.
    pub fn command_text(&self) -> String {
        self.virus().unwrap_or_default().to_string()
    }

    /// Returns the file hash.
    pub fn file_hash(&self) -> &FileHash {
        &self.file_metadata.hash
    }

    /// Sets the engine version.
    pub fn with_engine_version(mut self, version: impl Into<String>) -> Self {
        self.engine_version = Some(version.into());
        self
    }
}

/// Serde helper for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> FileMetadata {
        FileMetadata::new(1000, FileHash::new("abc123"))
    }

    #[test]
    fn test_clean_result_command_text_is_empty() {
        let result = ScanResult::new(
            ScanOutcome::Clean,
            metadata(),
            "test-engine",
            Duration::from_millis(100),
        );

        assert!(result.is_clean());
        assert!(!result.is_infected());
        assert_eq!(result.command_text(), "");
    }

    #[test]
    fn test_infected_result_command_text_is_virus_name() {
        let result = ScanResult::new(
            ScanOutcome::infected("Win.Test.EICAR_HDB-1"),
            metadata(),
            "test-engine",
            Duration::from_millis(100),
        );

        assert!(result.is_infected());
        assert_eq!(result.virus(), Some("Win.Test.EICAR_HDB-1"));
        assert_eq!(result.command_text(), "Win.Test.EICAR_HDB-1");
    }

    #[test]
    fn test_duration_serializes_as_millis() {
        let result = ScanResult::new(
            ScanOutcome::Clean,
            metadata(),
            "test-engine",
            Duration::from_millis(250),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["duration"], 250);
        assert_eq!(json["outcome"]["type"], "clean");

        let back: ScanResult = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration, Duration::from_millis(250));
    }
}
