//! In-process engine for tests and demos.
//!
//! The mock never looks for real signatures. It reports outcomes keyed by
//! BLAKE3 hash, or flags any content containing a configured marker.

use crate::core::{
    DatabaseInfo, FileHasher, FileMetadata, ScanError, ScanLimits, ScanOutcome, ScanResult,
    ScanSettings, Scanner,
};

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// A configurable fake engine.
///
/// # Examples
///
/// ```rust
/// use clamcmd::engine::MockScanner;
/// use std::time::Duration;
///
/// // Everything is clean
/// let scanner = MockScanner::new_clean();
///
/// // Anything containing "EICAR" is reported as Eicar-Test-Signature
/// let scanner = MockScanner::new().with_marker("EICAR", "Eicar-Test-Signature");
///
/// // Every scan fails with an engine error
/// let scanner = MockScanner::new().with_error("Can't allocate memory");
/// ```
#[derive(Debug)]
pub struct MockScanner {
    name: String,
    responses: RwLock<HashMap<String, ScanOutcome>>,
    markers: Vec<(Vec<u8>, String)>,
    default_outcome: ScanOutcome,
    error: Option<String>,
    load_error: Option<String>,
    signature_count: u64,
    hasher: FileHasher,
    latency: Option<Duration>,
    scan_count: AtomicU64,
    load_count: AtomicU64,
    unhealthy: RwLock<bool>,
}

impl MockScanner {
    /// Creates a new mock scanner that reports everything clean.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: RwLock::new(HashMap::new()),
            markers: Vec::new(),
            default_outcome: ScanOutcome::Clean,
            error: None,
            load_error: None,
            signature_count: 42,
            hasher: FileHasher::new().with_sha256(cfg!(feature = "sha256")),
            latency: None,
            scan_count: AtomicU64::new(0),
            load_count: AtomicU64::new(0),
            unhealthy: RwLock::new(false),
        }
    }

    /// Creates a mock scanner that always reports clean.
    pub fn new_clean() -> Self {
        Self::new()
    }

    /// Creates a mock scanner that reports every input as infected.
    pub fn new_infected(virus: impl Into<String>) -> Self {
        Self {
            default_outcome: ScanOutcome::infected(virus),
            ..Self::new()
        }
    }

    /// Sets the name of this scanner.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Reports `virus` for any content containing `marker`.
    pub fn with_marker(mut self, marker: impl AsRef<[u8]>, virus: impl Into<String>) -> Self {
        self.markers.push((marker.as_ref().to_vec(), virus.into()));
        self
    }

    /// Adds a response for a specific BLAKE3 hash.
    pub fn with_response(self, hash: impl Into<String>, outcome: ScanOutcome) -> Self {
        self.responses
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(hash.into(), outcome);
        self
    }

    /// Makes every scan fail with an engine error carrying `message`.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Makes `load` fail with `reason`.
    pub fn with_load_error(mut self, reason: impl Into<String>) -> Self {
        self.load_error = Some(reason.into());
        self
    }

    /// Sets the signature count reported by `load`.
    pub fn with_signature_count(mut self, count: u64) -> Self {
        self.signature_count = count;
        self
    }

    /// Sets the simulated latency for scans.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Returns the number of scans performed.
    pub fn scan_count(&self) -> u64 {
        self.scan_count.load(Ordering::Relaxed)
    }

    /// Returns how many times `load` was called.
    pub fn load_count(&self) -> u64 {
        self.load_count.load(Ordering::Relaxed)
    }

    /// Sets the health status.
    pub fn set_healthy(&self, healthy: bool) {
        *self
            .unhealthy
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = !healthy;
    }

    fn verdict(&self, data: &[u8], hash: &str) -> Result<ScanOutcome, ScanError> {
        if let Some(ref message) = self.error {
            return Err(ScanError::engine_error(&self.name, message));
        }
        if let Some(outcome) = self
            .responses
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(hash)
        {
            return Ok(outcome.clone());
        }
        for (marker, virus) in &self.markers {
            if !marker.is_empty() && data.windows(marker.len()).any(|w| w == marker.as_slice()) {
                return Ok(ScanOutcome::infected(virus));
            }
        }
        Ok(self.default_outcome.clone())
    }

    async fn run(&self, data: &[u8], settings: &ScanSettings) -> Result<ScanResult, ScanError> {
        self.scan_count.fetch_add(1, Ordering::Relaxed);
        settings.check_size(data.len() as u64)?;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let hash = self.hasher.hash_bytes(data);
        let outcome = self.verdict(data, &hash.blake3)?;
        let metadata = FileMetadata::new(data.len() as u64, hash);
        let duration = self.latency.unwrap_or(Duration::from_millis(1));

        Ok(ScanResult::new(outcome, metadata, self.name.clone(), duration))
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scanner for MockScanner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self, _limits: &ScanLimits) -> Result<DatabaseInfo, ScanError> {
        self.load_count.fetch_add(1, Ordering::Relaxed);
        if let Some(ref reason) = self.load_error {
            return Err(ScanError::database_load(reason));
        }
        Ok(DatabaseInfo {
            engine_version: Some(format!("{} 1.0", self.name)),
            signature_version: Some("1".into()),
            signature_count: Some(self.signature_count),
            dbdir: None,
        })
    }

    async fn scan_buffer(
        &self,
        data: &[u8],
        settings: &ScanSettings,
    ) -> Result<ScanResult, ScanError> {
        self.run(data, settings).await
    }

    async fn scan_file(
        &self,
        path: &Path,
        settings: &ScanSettings,
    ) -> Result<ScanResult, ScanError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| ScanError::from_io_at(path, e))?;
        let mut result = self.run(&data, settings).await?;
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            result.file_metadata.filename = Some(name.to_string());
        }
        Ok(result)
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        if *self
            .unhealthy
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
        {
            return Err(ScanError::engine_unavailable(
                &self.name,
                "mock scanner is unhealthy",
            ));
        }
        Ok(())
    }

    async fn signature_version(&self) -> Option<String> {
        Some("1".into())
    }
}
