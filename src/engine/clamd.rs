//! ClamAV daemon backend.
//!
//! Talks to `clamd` over a Unix socket or TCP using the null-terminated
//! `z` command protocol:
//!
//! - `zPING` / `zVERSION` at startup and for health checks
//! - `zINSTREAM` to send buffers (and files, in stream mode) as
//!   big-endian length-prefixed chunks closed by a zero-length chunk
//! - `zSCAN <path>` to have the daemon open a file itself, used for
//!   `file_mode = "path"` and for every `buffer_mode = "tempfile"` scan
//!
//! The daemon owns the signature database and the archive limits
//! (`MaxFiles`, `MaxRecursion`, ... in `clamd.conf`). This backend
//! enforces `maxfilesize` before any data is sent.

use crate::core::{
    DatabaseInfo, FileHasher, FileMetadata, ScanError, ScanLimits, ScanOutcome, ScanResult,
    ScanSettings, Scanner,
};

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const ENGINE: &str = "clamd";

/// Largest chunk sent in one INSTREAM frame.
const CHUNK_SIZE: usize = 2048;

/// Upper bound on a reply we are willing to buffer.
const MAX_REPLY: u64 = 64 * 1024;

/// File extensions clamd loads from its database directory.
const DATABASE_EXTENSIONS: &[&str] = &[
    "cvd", "cld", "cud", "hdb", "hsb", "hdu", "hsu", "mdb", "msb", "mdu", "msu", "ndb", "ndu",
    "ldb", "ldu", "cdb", "idb", "gdb", "pdb", "wdb", "fp", "sfp", "ign", "ign2", "cbc", "ftm",
    "crb", "yar", "yara",
];

/// Where the daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local socket path.
    Unix(PathBuf),
    /// `host:port`.
    Tcp(String),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "unix:{}", path.display()),
            Self::Tcp(addr) => write!(f, "tcp:{addr}"),
        }
    }
}

/// How `scanbuff` hands a buffer to the daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferMode {
    /// Stream the bytes with INSTREAM.
    #[default]
    Stream,
    /// Write the bytes to a temporary file and have the daemon scan it by
    /// path. The file is readable by the daemon and removed afterwards.
    #[serde(rename = "tempfile")]
    TempFile,
}

/// How `scanfile` hands a file to the daemon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileMode {
    /// Read the file locally and stream it with INSTREAM.
    #[default]
    Stream,
    /// Send the absolute path with SCAN; the daemon must be able to read it.
    Path,
}

/// clamd backend configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClamdConfig {
    /// Where the daemon listens.
    pub endpoint: Endpoint,

    /// Connection timeout.
    pub connection_timeout: Duration,

    /// Timeout for a whole request/reply exchange.
    pub scan_timeout: Duration,

    /// Buffer hand-off strategy.
    pub buffer_mode: BufferMode,

    /// File hand-off strategy.
    pub file_mode: FileMode,

    /// Database directory to verify at load time, if configured.
    pub dbdir: Option<PathBuf>,

    /// Directory for `buffer_mode = "tempfile"` files; the system temp
    /// directory when unset. The daemon must be able to read it.
    pub tempdir: Option<PathBuf>,
}

impl Default for ClamdConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::Unix(PathBuf::from("/var/run/clamav/clamd.sock")),
            connection_timeout: Duration::from_secs(10),
            scan_timeout: Duration::from_secs(300),
            buffer_mode: BufferMode::Stream,
            file_mode: FileMode::Stream,
            dbdir: None,
            tempdir: None,
        }
    }
}

impl ClamdConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a Unix socket.
    pub fn with_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.endpoint = Endpoint::Unix(path.into());
        self
    }

    /// Uses a TCP connection.
    pub fn with_tcp(mut self, address: impl Into<String>) -> Self {
        self.endpoint = Endpoint::Tcp(address.into());
        self
    }

    /// Sets the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the scan timeout.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Sets the buffer hand-off strategy.
    pub fn with_buffer_mode(mut self, mode: BufferMode) -> Self {
        self.buffer_mode = mode;
        self
    }

    /// Sets the file hand-off strategy.
    pub fn with_file_mode(mut self, mode: FileMode) -> Self {
        self.file_mode = mode;
        self
    }

    /// Sets the database directory checked at load time.
    pub fn with_dbdir(mut self, dbdir: impl Into<PathBuf>) -> Self {
        self.dbdir = Some(dbdir.into());
        self
    }

    /// Sets the directory temporary buffer files are created in.
    pub fn with_tempdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tempdir = Some(dir.into());
        self
    }
}

/// A request in the `z` command protocol.
#[derive(Debug)]
enum Request<'a> {
    Ping,
    Version,
    Instream(&'a [u8]),
    Scan(&'a str),
}

trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// clamd scanner.
///
/// # Example
///
/// ```rust,ignore
/// use clamcmd::engine::{ClamdConfig, ClamdScanner};
///
/// let scanner = ClamdScanner::new(ClamdConfig::new().with_tcp("127.0.0.1:3310"));
/// ```
#[derive(Debug)]
pub struct ClamdScanner {
    config: ClamdConfig,
    hasher: FileHasher,
    signature_version: RwLock<Option<String>>,
}

impl ClamdScanner {
    /// Creates a new clamd scanner with the given configuration.
    pub fn new(config: ClamdConfig) -> Self {
        Self {
            config,
            hasher: FileHasher::new().with_sha256(cfg!(feature = "sha256")),
            signature_version: RwLock::new(None),
        }
    }

    /// Creates a clamd scanner with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ClamdConfig::default())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClamdConfig {
        &self.config
    }

    async fn connect(&self) -> Result<Box<dyn Transport>, ScanError> {
        let connect = async {
            match &self.config.endpoint {
                #[cfg(unix)]
                Endpoint::Unix(path) => tokio::net::UnixStream::connect(path)
                    .await
                    .map(|s| Box::new(s) as Box<dyn Transport>),
                #[cfg(not(unix))]
                Endpoint::Unix(_) => Err(std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "Unix sockets not supported on this platform",
                )),
                Endpoint::Tcp(addr) => tokio::net::TcpStream::connect(addr.as_str())
                    .await
                    .map(|s| Box::new(s) as Box<dyn Transport>),
            }
        };

        match tokio::time::timeout(self.config.connection_timeout, connect).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ScanError::connection_failed(
                ENGINE,
                format!("{}: {e}", self.config.endpoint),
            )),
            Err(_) => Err(ScanError::timeout(ENGINE, self.config.connection_timeout)),
        }
    }

    /// Sends one request on a fresh connection and returns the trimmed reply.
    async fn roundtrip(&self, request: Request<'_>, limit: Duration) -> Result<String, ScanError> {
        let mut stream = self.connect().await?;

        let exchange = async {
            write_request(&mut stream, &request).await?;
            stream.flush().await?;
            let mut reply = Vec::new();
            (&mut stream).take(MAX_REPLY).read_to_end(&mut reply).await?;
            Ok::<_, std::io::Error>(reply)
        };

        let reply = match tokio::time::timeout(limit, exchange).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(ScanError::connection_failed(ENGINE, e.to_string())),
            Err(_) => return Err(ScanError::timeout(ENGINE, limit)),
        };

        let text = String::from_utf8_lossy(&reply);
        Ok(text.trim_end_matches('\0').trim().to_string())
    }

    async fn ping(&self) -> Result<(), ScanError> {
        let reply = self
            .roundtrip(Request::Ping, self.config.connection_timeout)
            .await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(ScanError::engine_unavailable(
                ENGINE,
                format!("unexpected PING reply: {reply}"),
            ))
        }
    }

    async fn instream(&self, data: &[u8]) -> Result<ScanOutcome, ScanError> {
        let reply = self
            .roundtrip(Request::Instream(data), self.config.scan_timeout)
            .await?;
        parse_scan_reply(&reply, "stream")
    }

    async fn scan_path(&self, path: &Path) -> Result<ScanOutcome, ScanError> {
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| ScanError::from_io_at(path, e))?;
        let target = absolute
            .to_str()
            .filter(|p| !p.contains(['\0', '\n']))
            .ok_or_else(|| {
                ScanError::internal(format!(
                    "path cannot be sent to clamd: {}",
                    absolute.display()
                ))
            })?;

        let reply = self
            .roundtrip(Request::Scan(target), self.config.scan_timeout)
            .await?;
        parse_scan_reply(&reply, target)
    }

    /// Scans a file that is known to exist, honoring `file_mode`.
    async fn scan_existing_file(
        &self,
        path: &Path,
        size: u64,
    ) -> Result<(ScanOutcome, crate::core::FileHash), ScanError> {
        match self.config.file_mode {
            FileMode::Stream => {
                let data = tokio::fs::read(path)
                    .await
                    .map_err(|e| ScanError::from_io_at(path, e))?;
                let hash = self.hasher.hash_bytes(&data);
                Ok((self.instream(&data).await?, hash))
            }
            FileMode::Path => {
                tracing::trace!(path = %path.display(), size, "Sending SCAN by path");
                let hash = self.hasher.hash_file_async(path).await?;
                Ok((self.scan_path(path).await?, hash))
            }
        }
    }

    /// Creates the file a buffer is written to before a SCAN by path.
    fn scan_tempfile(&self) -> Result<tempfile::NamedTempFile, ScanError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("clamcmd-");
        let temp = match self.config.tempdir {
            Some(ref dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        // clamd usually runs as its own user; set after creation so the
        // umask does not apply
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o644))?;
        }
        Ok(temp)
    }

    async fn scan_via_tempfile(&self, data: &[u8]) -> Result<ScanOutcome, ScanError> {
        let temp = self.scan_tempfile()?;
        tokio::fs::write(temp.path(), data).await?;
        tracing::trace!(path = %temp.path().display(), size = data.len(), "Scanning buffer by path");

        let outcome = self.scan_path(temp.path()).await;

        if let Err(e) = temp.close() {
            tracing::warn!(error = %e, "Failed to remove temporary scan file");
        }
        outcome
    }

    fn result(&self, outcome: ScanOutcome, metadata: FileMetadata, start: Instant) -> ScanResult {
        let mut result = ScanResult::new(outcome, metadata, ENGINE, start.elapsed());
        if let Some(version) = self
            .signature_version
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
        {
            result = result.with_engine_version(version);
        }
        result
    }
}

async fn write_request<W: AsyncWrite + Unpin + ?Sized>(
    stream: &mut W,
    request: &Request<'_>,
) -> std::io::Result<()> {
    match request {
        Request::Ping => stream.write_all(b"zPING\0").await,
        Request::Version => stream.write_all(b"zVERSION\0").await,
        Request::Scan(path) => {
            stream.write_all(b"zSCAN ").await?;
            stream.write_all(path.as_bytes()).await?;
            stream.write_all(b"\0").await
        }
        Request::Instream(data) => {
            stream.write_all(b"zINSTREAM\0").await?;
            for chunk in data.chunks(CHUNK_SIZE) {
                stream.write_all(&(chunk.len() as u32).to_be_bytes()).await?;
                stream.write_all(chunk).await?;
            }
            stream.write_all(&0u32.to_be_bytes()).await
        }
    }
}

/// Parses a scan reply such as `stream: Eicar-Test-Signature FOUND`.
///
/// `target` is the name the daemon echoes back: `stream` for INSTREAM,
/// the path for SCAN.
fn parse_scan_reply(reply: &str, target: &str) -> Result<ScanOutcome, ScanError> {
    let body = reply
        .strip_prefix(target)
        .and_then(|rest| rest.strip_prefix(": "))
        .unwrap_or(reply);

    if body == "OK" {
        Ok(ScanOutcome::Clean)
    } else if let Some(virus) = body.strip_suffix(" FOUND") {
        let virus = virus.rsplit(": ").next().unwrap_or(virus).trim();
        if virus.is_empty() {
            return Err(ScanError::AmbiguousResponse {
                engine: ENGINE.into(),
                details: reply.to_string(),
            });
        }
        Ok(ScanOutcome::infected(virus))
    } else if let Some(message) = body.strip_suffix(" ERROR") {
        Err(ScanError::engine_error(ENGINE, message.trim()))
    } else {
        Err(ScanError::AmbiguousResponse {
            engine: ENGINE.into(),
            details: reply.to_string(),
        })
    }
}

/// Parses a VERSION reply: `ClamAV 1.3.1/27350/Wed Jul 10 08:21:25 2024`.
///
/// Returns the engine version and the signature database version; the
/// latter is `None` when the daemon has no database loaded.
fn parse_version(reply: &str) -> Result<(String, Option<String>), ScanError> {
    let mut parts = reply.split('/');
    let engine = parts.next().map(str::trim).unwrap_or_default();
    if !engine.starts_with("ClamAV") {
        return Err(ScanError::AmbiguousResponse {
            engine: ENGINE.into(),
            details: format!("unexpected VERSION reply: {reply}"),
        });
    }
    let signatures = parts
        .next()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    Ok((engine.to_string(), signatures))
}

/// Counts database files in `dir`.
async fn count_database_files(dir: &Path) -> Result<usize, ScanError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ScanError::database_load(format!("cannot read {}: {e}", dir.display())))?;

    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_db = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| DATABASE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if is_db {
            count += 1;
        }
    }
    Ok(count)
}

#[async_trait]
impl Scanner for ClamdScanner {
    fn name(&self) -> &str {
        ENGINE
    }

    async fn load(&self, limits: &ScanLimits) -> Result<DatabaseInfo, ScanError> {
        if let Some(ref dbdir) = self.config.dbdir {
            let files = count_database_files(dbdir).await?;
            if files == 0 {
                return Err(ScanError::database_load(format!(
                    "no signature databases in {}",
                    dbdir.display()
                )));
            }
            tracing::debug!(dbdir = %dbdir.display(), files, "Found signature database files");
        }

        self.ping()
            .await
            .map_err(|e| ScanError::database_load(e.to_string()))?;

        let reply = self
            .roundtrip(Request::Version, self.config.connection_timeout)
            .await
            .map_err(|e| ScanError::database_load(e.to_string()))?;
        let (engine_version, signature_version) = parse_version(&reply)?;
        let Some(signature_version) = signature_version else {
            return Err(ScanError::database_load(format!(
                "{engine_version} reports no signature database"
            )));
        };

        *self
            .signature_version
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(signature_version.clone());

        tracing::debug!(
            endpoint = %self.config.endpoint,
            maxfiles = limits.maxfiles,
            maxreclevel = limits.maxreclevel,
            maxratio = limits.maxratio,
            archivememlim = limits.archivememlim,
            "Archive limits are enforced by the daemon configuration"
        );

        Ok(DatabaseInfo {
            engine_version: Some(engine_version),
            signature_version: Some(signature_version),
            signature_count: None,
            dbdir: self.config.dbdir.clone(),
        })
    }

    async fn scan_buffer(
        &self,
        data: &[u8],
        settings: &ScanSettings,
    ) -> Result<ScanResult, ScanError> {
        let start = Instant::now();
        settings.check_size(data.len() as u64)?;

        let hash = self.hasher.hash_bytes(data);
        let outcome = match self.config.buffer_mode {
            BufferMode::Stream => self.instream(data).await?,
            BufferMode::TempFile => self.scan_via_tempfile(data).await?,
        };

        let metadata = FileMetadata::new(data.len() as u64, hash);
        Ok(self.result(outcome, metadata, start))
    }

    async fn scan_file(
        &self,
        path: &Path,
        settings: &ScanSettings,
    ) -> Result<ScanResult, ScanError> {
        let start = Instant::now();

        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| ScanError::from_io_at(path, e))?;
        if !meta.is_file() {
            return Err(ScanError::engine_error(
                ENGINE,
                format!("{}: not a regular file", path.display()),
            ));
        }
        settings.check_size(meta.len())?;

        // ScanArchive/ScanMail/ScanOLE2 live in clamd.conf
        tracing::trace!(
            path = %path.display(),
            archive = settings.options.archive,
            mail = settings.options.mail,
            ole2 = settings.options.ole2,
            "Scanning file"
        );

        let (outcome, hash) = self.scan_existing_file(path, meta.len()).await?;

        let mut metadata = FileMetadata::new(meta.len(), hash);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            metadata = metadata.with_filename(name);
        }
        Ok(self.result(outcome, metadata, start))
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        self.ping().await
    }

    async fn signature_version(&self) -> Option<String> {
        self.signature_version
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
