//! The `Scanner` trait: the seam between this crate and the external
//! scanning engine.

use crate::core::error::ScanError;
use crate::core::input::FileInput;
use crate::core::result::ScanResult;
use crate::core::types::{DatabaseInfo, ScanLimits, ScanSettings};

use async_trait::async_trait;
use std::fmt::Debug;
use std::path::Path;

/// An external antivirus engine.
///
/// The crate never inspects content itself. Implementations forward
/// buffers and paths to the engine and translate its answer into a
/// [`ScanResult`] or a [`ScanError`].
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync`; one engine handle is shared
///   by every interpreter that has the command registered.
/// - `load` is called exactly once, before any scan.
/// - Implementations should never panic; all errors are returned as
///   `ScanError`.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use clamcmd::core::{DatabaseInfo, ScanError, ScanLimits, ScanResult, ScanSettings, Scanner};
/// use async_trait::async_trait;
/// use std::path::Path;
///
/// #[derive(Debug)]
/// struct MyEngine;
///
/// #[async_trait]
/// impl Scanner for MyEngine {
///     fn name(&self) -> &str {
///         "my-engine"
///     }
///
///     async fn load(&self, _limits: &ScanLimits) -> Result<DatabaseInfo, ScanError> {
///         Ok(DatabaseInfo::default())
///     }
///
///     async fn scan_buffer(&self, data: &[u8], settings: &ScanSettings) -> Result<ScanResult, ScanError> {
///         todo!()
///     }
///
///     async fn scan_file(&self, path: &Path, settings: &ScanSettings) -> Result<ScanResult, ScanError> {
///         todo!()
///     }
///
///     async fn health_check(&self) -> Result<(), ScanError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Scanner: Send + Sync + Debug {
    /// Returns a stable identifier for this engine, e.g. `clamd`.
    fn name(&self) -> &str;

    /// Brings the engine up and makes sure its signature database is loaded.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::DatabaseLoad` when the database is missing or
    /// cannot be loaded, or a connection error when the engine is
    /// unreachable.
    async fn load(&self, limits: &ScanLimits) -> Result<DatabaseInfo, ScanError>;

    /// Scans an in-memory buffer.
    async fn scan_buffer(
        &self,
        data: &[u8],
        settings: &ScanSettings,
    ) -> Result<ScanResult, ScanError>;

    /// Scans a file on disk.
    ///
    /// # Errors
    ///
    /// - `FileNotFound` - The path does not exist.
    /// - `FileTooLarge` - The file exceeds `maxfilesize`.
    /// - `Engine` - The engine rejected the file.
    /// - `Timeout` / `ConnectionFailed` - The engine could not be reached in time.
    async fn scan_file(&self, path: &Path, settings: &ScanSettings)
        -> Result<ScanResult, ScanError>;

    /// Scans either kind of input.
    async fn scan(&self, input: &FileInput, settings: &ScanSettings) -> Result<ScanResult, ScanError> {
        match input {
            FileInput::Path(path) => self.scan_file(path, settings).await,
            FileInput::Bytes { data, filename } => {
                let mut result = self.scan_buffer(data, settings).await?;
                if let Some(name) = filename {
                    result.file_metadata.filename = Some(name.clone());
                }
                Ok(result)
            }
        }
    }

    /// Lightweight liveness check that does not touch file data.
    async fn health_check(&self) -> Result<(), ScanError>;

    /// Returns the engine's signature database version, if available.
    async fn signature_version(&self) -> Option<String> {
        None
    }
}

/// An arc-wrapped scanner for shared ownership.
pub type ArcScanner = std::sync::Arc<dyn Scanner>;
