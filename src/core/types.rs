//! Core types used throughout the clamcmd library.
//!
//! This module defines scan outcomes, engine limits and options, file
//! hashes and the information an engine reports about its signature
//! database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// The outcome of a completed scan.
///
/// Engine failures are not an outcome; they surface as
/// [`ScanError`](crate::core::ScanError).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// No virus was found.
    Clean,

    /// The engine matched a signature.
    Infected {
        /// Name of the matched signature, e.g. `Eicar-Test-Signature`.
        virus: String,
    },
}

impl ScanOutcome {
    /// Creates an `Infected` outcome.
    pub fn infected(virus: impl Into<String>) -> Self {
        Self::Infected {
            virus: virus.into(),
        }
    }

    /// Returns `true` if the outcome indicates a clean file.
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Returns `true` if the outcome indicates an infected file.
    pub fn is_infected(&self) -> bool {
        matches!(self, Self::Infected { .. })
    }

    /// Returns the virus name, if infected.
    pub fn virus(&self) -> Option<&str> {
        match self {
            Self::Infected { virus } => Some(virus),
            Self::Clean => None,
        }
    }

    /// Short lowercase label used in logs and audit events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Infected { .. } => "infected",
        }
    }
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Infected { virus } => write!(f, "infected ({virus})"),
        }
    }
}

/// Resource limits applied while scanning archives and large files.
///
/// The field names follow the configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanLimits {
    /// Maximum number of files scanned inside an archive.
    pub maxfiles: u64,

    /// Maximum size in bytes of a single scanned file or buffer.
    pub maxfilesize: u64,

    /// Maximum archive recursion depth.
    pub maxreclevel: u64,

    /// Maximum compression ratio before an archive is treated as a bomb.
    pub maxratio: u64,

    /// Memory limit for archive unpacking; `0` disables it.
    pub archivememlim: u64,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            maxfiles: 1000,
            maxfilesize: 10 * 1_048_576,
            maxreclevel: 5,
            maxratio: 200,
            archivememlim: 0,
        }
    }
}

/// Which content types the engine should look inside when scanning a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Unpack archives.
    pub archive: bool,
    /// Parse mail files.
    pub mail: bool,
    /// Parse OLE2 containers (MS Office documents).
    pub ole2: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            archive: true,
            mail: true,
            ole2: true,
        }
    }
}

impl ScanOptions {
    /// Options with every content parser disabled.
    pub fn raw() -> Self {
        Self {
            archive: false,
            mail: false,
            ole2: false,
        }
    }
}

/// Limits and options sent along with every scan request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Resource limits.
    pub limits: ScanLimits,
    /// Content parsers to enable.
    pub options: ScanOptions,
}

impl ScanSettings {
    /// Creates settings from limits and options.
    pub fn new(limits: ScanLimits, options: ScanOptions) -> Self {
        Self { limits, options }
    }

    /// Returns an error if `size` exceeds the configured `maxfilesize`.
    pub fn check_size(&self, size: u64) -> Result<(), crate::core::ScanError> {
        if self.limits.maxfilesize > 0 && size > self.limits.maxfilesize {
            return Err(crate::core::ScanError::FileTooLarge {
                size,
                max: self.limits.maxfilesize,
            });
        }
        Ok(())
    }
}

/// What an engine reports after loading its signature database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    /// Engine version string, e.g. `ClamAV 1.3.1`.
    pub engine_version: Option<String>,

    /// Signature database version, e.g. `27350`.
    pub signature_version: Option<String>,

    /// Number of loaded signatures, when the engine reports it.
    pub signature_count: Option<u64>,

    /// Database directory, when known.
    pub dbdir: Option<PathBuf>,
}

impl DatabaseInfo {
    /// Text for the startup log line.
    pub fn summary(&self) -> String {
        match (self.signature_count, &self.signature_version) {
            (Some(count), _) => format!("loaded {count} signatures"),
            (None, Some(version)) => format!("loaded signature database version {version}"),
            (None, None) => "signature database loaded".to_string(),
        }
    }
}

/// File hash information.
///
/// BLAKE3 is always computed. SHA256 is only filled in when the
/// `sha256` feature is enabled and requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileHash {
    /// BLAKE3 hash, hex encoded.
    pub blake3: String,

    /// SHA256 hash, hex encoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl FileHash {
    /// Creates a new `FileHash` with only BLAKE3.
    pub fn new(blake3: impl Into<String>) -> Self {
        Self {
            blake3: blake3.into(),
            sha256: None,
        }
    }

    /// Sets the SHA256 hash.
    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into());
        self
    }
}

impl fmt::Display for FileHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "blake3:{}", self.blake3)
    }
}

/// Metadata about a scanned file or buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Filename, if known.
    pub filename: Option<String>,

    /// Size in bytes.
    pub size: u64,

    /// Hash of the content.
    pub hash: FileHash,

    /// When the content was received for scanning.
    pub received_at: DateTime<Utc>,
}

impl FileMetadata {
    /// Creates new file metadata with required fields.
    pub fn new(size: u64, hash: FileHash) -> Self {
        Self {
            filename: None,
            size,
            hash,
            received_at: Utc::now(),
        }
    }

    /// Sets the filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_outcome_is_methods() {
        assert!(ScanOutcome::Clean.is_clean());
        assert!(!ScanOutcome::Clean.is_infected());
        assert_eq!(ScanOutcome::Clean.virus(), None);

        let infected = ScanOutcome::infected("Eicar-Test-Signature");
        assert!(infected.is_infected());
        assert_eq!(infected.virus(), Some("Eicar-Test-Signature"));
        assert_eq!(infected.as_str(), "infected");
    }

    #[test]
    fn test_default_limits() {
        let limits = ScanLimits::default();
        assert_eq!(limits.maxfiles, 1000);
        assert_eq!(limits.maxfilesize, 10 * 1048576);
        assert_eq!(limits.maxreclevel, 5);
        assert_eq!(limits.maxratio, 200);
        assert_eq!(limits.archivememlim, 0);
    }

    #[test]
    fn test_default_options_enable_all_parsers() {
        let opts = ScanOptions::default();
        assert!(opts.archive && opts.mail && opts.ole2);
        assert_eq!(ScanOptions::raw().archive, false);
    }

    #[test]
    fn test_check_size() {
        let settings = ScanSettings::new(
            ScanLimits {
                maxfilesize: 10,
                ..Default::default()
            },
            ScanOptions::default(),
        );
        assert!(settings.check_size(10).is_ok());
        assert!(matches!(
            settings.check_size(11),
            Err(crate::core::ScanError::FileTooLarge { size: 11, max: 10 })
        ));

        let unlimited = ScanSettings::new(
            ScanLimits {
                maxfilesize: 0,
                ..Default::default()
            },
            ScanOptions::default(),
        );
        assert!(unlimited.check_size(u64::MAX).is_ok());
    }

    #[test]
    fn test_database_summary() {
        let info = DatabaseInfo {
            signature_count: Some(8_700_000),
            ..Default::default()
        };
        assert_eq!(info.summary(), "loaded 8700000 signatures");

        let info = DatabaseInfo {
            signature_version: Some("27350".into()),
            ..Default::default()
        };
        assert_eq!(info.summary(), "loaded signature database version 27350");
    }

    #[test]
    fn test_file_hash_display() {
        let hash = FileHash::new("abc123").with_sha256("def456");
        assert_eq!(format!("{}", hash), "blake3:abc123");
    }
}
