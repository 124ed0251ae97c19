//! File hashing with BLAKE3.
//!
//! Scan results and audit events carry a content hash so a detection can
//! be correlated with the exact bytes that were scanned. SHA256 is
//! available behind the `sha256` feature for sinks that index on it.

use crate::core::error::ScanError;
use crate::core::types::FileHash;

use std::io::Read;
use std::path::Path;

/// Computes [`FileHash`] values.
///
/// ```rust
/// use clamcmd::core::FileHasher;
///
/// let hash = FileHasher::new().hash_bytes(b"hello world");
/// assert_eq!(hash.blake3.len(), 64);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileHasher {
    compute_sha256: bool,
}

impl FileHasher {
    /// Creates a new `FileHasher` (BLAKE3 only).
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables SHA256. Ignored without the `sha256` feature.
    pub fn with_sha256(mut self, enabled: bool) -> Self {
        self.compute_sha256 = enabled;
        self
    }

    /// Returns whether SHA256 computation is enabled and available.
    pub fn computes_sha256(&self) -> bool {
        self.compute_sha256 && cfg!(feature = "sha256")
    }

    /// Computes hashes from bytes.
    pub fn hash_bytes(&self, data: &[u8]) -> FileHash {
        let blake3 = blake3::hash(data).to_hex().to_string();
        let sha256 = if self.computes_sha256() {
            sha256_hex(data)
        } else {
            None
        };
        FileHash { blake3, sha256 }
    }

    /// Computes hashes from a file path, streaming the contents.
    pub fn hash_file(&self, path: &Path) -> Result<FileHash, ScanError> {
        let file = std::fs::File::open(path).map_err(|e| ScanError::from_io_at(path, e))?;
        let mut reader = std::io::BufReader::new(file);
        self.hash_reader(&mut reader)
    }

    /// Computes hashes from a synchronous reader in a single pass.
    pub fn hash_reader<R: Read>(&self, reader: &mut R) -> Result<FileHash, ScanError> {
        let mut blake3_hasher = blake3::Hasher::new();
        let mut sha = Sha256State::new(self.computes_sha256());

        let mut buffer = [0u8; 64 * 1024];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            let chunk = &buffer[..bytes_read];
            blake3_hasher.update(chunk);
            sha.update(chunk);
        }

        Ok(FileHash {
            blake3: blake3_hasher.finalize().to_hex().to_string(),
            sha256: sha.finalize(),
        })
    }

    /// Asynchronously hashes a file without blocking the runtime.
    pub async fn hash_file_async(&self, path: &Path) -> Result<FileHash, ScanError> {
        let hasher = self.clone();
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || hasher.hash_file(&path))
            .await
            .map_err(|e| ScanError::internal(format!("hash task failed: {e}")))?
    }
}

#[cfg(feature = "sha256")]
fn sha256_hex(data: &[u8]) -> Option<String> {
    use sha2::{Digest, Sha256};
    Some(format!("{:x}", Sha256::digest(data)))
}

#[cfg(not(feature = "sha256"))]
fn sha256_hex(_data: &[u8]) -> Option<String> {
    None
}

#[cfg(feature = "sha256")]
struct Sha256State(Option<sha2::Sha256>);

#[cfg(feature = "sha256")]
impl Sha256State {
    fn new(enabled: bool) -> Self {
        use sha2::Digest;
        Self(enabled.then(sha2::Sha256::new))
    }

    fn update(&mut self, chunk: &[u8]) {
        use sha2::Digest;
        if let Some(h) = self.0.as_mut() {
            h.update(chunk);
        }
    }

    fn finalize(self) -> Option<String> {
        use sha2::Digest;
        self.0.map(|h| format!("{:x}", h.finalize()))
    }
}

#[cfg(not(feature = "sha256"))]
struct Sha256State;

#[cfg(not(feature = "sha256"))]
impl Sha256State {
    fn new(_enabled: bool) -> Self {
        Self
    }

    fn update(&mut self, _chunk: &[u8]) {}

    fn finalize(self) -> Option<String> {
        None
    }
}
