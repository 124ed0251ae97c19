//! Audit event types and emission functions.

use crate::core::{DatabaseInfo, ScanError, ScanResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracing target all audit events are emitted on.
pub const AUDIT_TARGET: &str = "clamcmd::audit";

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Audit event for a signature database load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineLoadedEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Configuration section of the module instance.
    pub section: String,

    /// Engine that loaded the database.
    pub engine: String,

    /// Engine version, if reported.
    pub engine_version: Option<String>,

    /// Signature database version, if reported.
    pub signature_version: Option<String>,

    /// Number of signatures, if reported.
    pub signature_count: Option<u64>,
}

impl EngineLoadedEvent {
    /// Builds the event from a load result.
    pub fn new(section: impl Into<String>, engine: impl Into<String>, info: &DatabaseInfo) -> Self {
        Self {
            timestamp: Utc::now(),
            section: section.into(),
            engine: engine.into(),
            engine_version: info.engine_version.clone(),
            signature_version: info.signature_version.clone(),
            signature_count: info.signature_count,
        }
    }
}

impl AuditEvent for EngineLoadedEvent {
    fn event_type(&self) -> &'static str {
        "engine_loaded"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit event for a completed scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Unique scan ID.
    pub scan_id: String,

    /// What was scanned: `buffer` or `file`.
    pub kind: String,

    /// File hash (BLAKE3).
    pub file_hash_blake3: String,

    /// File hash (SHA256, if available).
    pub file_hash_sha256: Option<String>,

    /// File name, if known.
    pub filename: Option<String>,

    /// Size of the scanned content in bytes.
    pub size: u64,

    /// Scan outcome.
    pub outcome: String,

    /// Virus name for infected content.
    pub virus: Option<String>,

    /// Engine that performed the scan.
    pub engine: String,

    /// Scan duration in milliseconds.
    pub duration_ms: u64,
}

impl ScanAuditEvent {
    /// Builds the event from a scan result.
    pub fn new(kind: &str, result: &ScanResult) -> Self {
        Self {
            timestamp: result.completed_at,
            scan_id: result.id.clone(),
            kind: kind.to_string(),
            file_hash_blake3: result.file_metadata.hash.blake3.clone(),
            file_hash_sha256: result.file_metadata.hash.sha256.clone(),
            filename: result.file_metadata.filename.clone(),
            size: result.file_metadata.size,
            outcome: result.outcome.as_str().to_string(),
            virus: result.virus().map(str::to_string),
            engine: result.engine.clone(),
            duration_ms: result.duration.as_millis() as u64,
        }
    }
}

impl AuditEvent for ScanAuditEvent {
    fn event_type(&self) -> &'static str {
        "scan_completed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Audit event for a scan that returned an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFailedEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// What was scanned: `buffer` or `file`.
    pub kind: String,

    /// Engine that was asked to scan.
    pub engine: String,

    /// Error text as reported to the caller.
    pub error: String,
}

impl ScanFailedEvent {
    /// Builds the event from a scan error.
    pub fn new(kind: &str, engine: impl Into<String>, error: &ScanError) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: kind.to_string(),
            engine: engine.into(),
            error: error.to_string(),
        }
    }
}

impl AuditEvent for ScanFailedEvent {
    fn event_type(&self) -> &'static str {
        "scan_failed"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a loaded signature database.
pub fn emit_engine_loaded(event: &EngineLoadedEvent) {
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = event.event_type(),
        section = %event.section,
        engine = %event.engine,
        engine_version = ?event.engine_version,
        signature_version = ?event.signature_version,
        signature_count = ?event.signature_count,
        "Signature database loaded"
    );
}

/// Emits an audit event for a completed scan.
pub fn emit_scan_completed(kind: &str, result: &ScanResult) -> ScanAuditEvent {
    let event = ScanAuditEvent::new(kind, result);
    tracing::info!(
        target: AUDIT_TARGET,
        event_type = event.event_type(),
        scan_id = %event.scan_id,
        kind = %event.kind,
        file_hash_blake3 = %event.file_hash_blake3,
        file_hash_sha256 = ?event.file_hash_sha256,
        filename = ?event.filename,
        size = event.size,
        outcome = %event.outcome,
        virus = ?event.virus,
        engine = %event.engine,
        duration_ms = event.duration_ms,
        "Scan completed"
    );
    event
}

/// Emits an audit event for a failed scan.
pub fn emit_scan_failed(kind: &str, engine: &str, error: &ScanError) -> ScanFailedEvent {
    let event = ScanFailedEvent::new(kind, engine, error);
    tracing::warn!(
        target: AUDIT_TARGET,
        event_type = event.event_type(),
        kind = %event.kind,
        engine = %event.engine,
        error = %event.error,
        "Scan failed"
    );
    event
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FileHash, FileMetadata, ScanOutcome};
    use std::time::Duration;

    fn infected_result() -> ScanResult {
        let metadata = FileMetadata::new(12, FileHash::new("abc123")).with_filename("a.zip");
        ScanResult::new(
            ScanOutcome::infected("Eicar-Test-Signature"),
            metadata,
            "clamd",
            Duration::from_millis(25),
        )
    }

    #[test]
    fn test_scan_event_from_result() {
        let result = infected_result();
        let event = ScanAuditEvent::new("file", &result);

        assert_eq!(event.event_type(), "scan_completed");
        assert_eq!(event.scan_id, result.id);
        assert_eq!(event.outcome, "infected");
        assert_eq!(event.virus.as_deref(), Some("Eicar-Test-Signature"));
        assert_eq!(event.filename.as_deref(), Some("a.zip"));
        assert_eq!(event.duration_ms, 25);
    }

    #[test]
    fn test_events_serialize_to_json() {
        let event = ScanFailedEvent::new(
            "buffer",
            "clamd",
            &ScanError::engine_error("clamd", "Can't allocate memory"),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["error"], "Can't allocate memory");
        assert_eq!(json["kind"], "buffer");

        let info = DatabaseInfo {
            engine_version: Some("ClamAV 1.3.1".into()),
            signature_version: Some("27350".into()),
            signature_count: None,
            dbdir: None,
        };
        let event = EngineLoadedEvent::new("ns/server/main/module/nsclamav", "clamd", &info);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["signature_version"], "27350");
        assert!(json["signature_count"].is_null());
        assert_eq!(event.event_type(), "engine_loaded");
    }

    #[test]
    fn test_emitters_return_logged_events() {
        let result = infected_result();
        let completed = emit_scan_completed("buffer", &result);
        assert_eq!(completed.scan_id, result.id);
        assert_eq!(completed.kind, "buffer");
        assert_eq!(completed.virus.as_deref(), Some("Eicar-Test-Signature"));

        let failed = emit_scan_failed("buffer", "clamd", &ScanError::internal("x"));
        assert_eq!(failed.event_type(), "scan_failed");
        assert_eq!(failed.error, "internal error: x");
        emit_engine_loaded(&EngineLoadedEvent::new("s", "mock", &DatabaseInfo::default()));
    }
}
