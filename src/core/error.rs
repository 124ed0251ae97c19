//! Error types for the clamcmd library.
//!
//! Engine, configuration and command failures each get their own typed
//! error. The library never panics; all errors are returned as `Result`
//! values and the command layer turns them into interpreter error text.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for engine and scan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scanning engine is unavailable or not responding.
    #[error("engine '{engine}' is unavailable: {reason}")]
    EngineUnavailable {
        /// Name of the engine that is unavailable.
        engine: String,
        /// Human-readable reason for unavailability.
        reason: String,
    },

    /// The scan operation timed out.
    #[error("scan timed out after {elapsed:?} on engine '{engine}'")]
    Timeout {
        /// Name of the engine that timed out.
        engine: String,
        /// How long the operation ran before timing out.
        elapsed: Duration,
    },

    /// Failed to connect to the scanning engine.
    #[error("connection to engine '{engine}' failed: {message}")]
    ConnectionFailed {
        /// Name of the engine.
        engine: String,
        /// Error message describing the failure.
        message: String,
    },

    /// The engine rejected the scan and reported an error of its own.
    ///
    /// The message is the engine's text verbatim, e.g. clamd's
    /// `Can't open file or directory`.
    #[error("{message}")]
    Engine {
        /// Name of the engine.
        engine: String,
        /// Error message reported by the engine.
        message: String,
    },

    /// The file exceeds the maximum allowed size.
    #[error("file size {size} bytes exceeds maximum {max} bytes")]
    FileTooLarge {
        /// Actual file size in bytes.
        size: u64,
        /// Maximum allowed size in bytes.
        max: u64,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found at the specified path.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// The engine returned a response that could not be parsed.
    #[error("ambiguous response from engine '{engine}': {details}")]
    AmbiguousResponse {
        /// Name of the engine.
        engine: String,
        /// Details about the ambiguity.
        details: String,
    },

    /// The signature database could not be loaded.
    #[error("failed to load db: {reason}")]
    DatabaseLoad {
        /// Why loading failed.
        reason: String,
    },

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl ScanError {
    /// Returns `true` if this error indicates the engine is unhealthy.
    pub fn indicates_unhealthy_engine(&self) -> bool {
        matches!(
            self,
            Self::EngineUnavailable { .. } | Self::Timeout { .. } | Self::ConnectionFailed { .. }
        )
    }

    /// Returns the engine name if this error is associated with one.
    pub fn engine(&self) -> Option<&str> {
        match self {
            Self::EngineUnavailable { engine, .. }
            | Self::Timeout { engine, .. }
            | Self::ConnectionFailed { engine, .. }
            | Self::Engine { engine, .. }
            | Self::AmbiguousResponse { engine, .. } => Some(engine),
            _ => None,
        }
    }

    /// Creates an `EngineUnavailable` error.
    pub fn engine_unavailable(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(engine: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            engine: engine.into(),
            elapsed,
        }
    }

    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Creates an `Engine` error carrying the engine's own message.
    pub fn engine_error(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Creates a `DatabaseLoad` error.
    pub fn database_load(reason: impl Into<String>) -> Self {
        Self::DatabaseLoad {
            reason: reason.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Maps an I/O error on `path`, turning `NotFound` into `FileNotFound`.
    pub fn from_io_at(path: &std::path::Path, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            Self::Io(err)
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML or has the wrong shape.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A key holds a value outside its allowed range.
    #[error("invalid value for '{key}' in [{section}]: {reason}")]
    InvalidValue {
        /// Section path the key belongs to.
        section: String,
        /// Offending key.
        key: String,
        /// Why the value is rejected.
        reason: String,
    },
}

/// Error returned by an interpreter command.
///
/// The display form is exactly the text the interpreter reports as the
/// command's error result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command was called with too few arguments.
    #[error("wrong # args: should be \"{usage}\"")]
    WrongArgs {
        /// Usage string, e.g. `ns_clamav command ?args ...?`.
        usage: String,
    },

    /// The subcommand is not one the command knows.
    #[error("bad {kind} \"{given}\": must be {choices}")]
    BadOption {
        /// What was being looked up, e.g. `command`.
        kind: String,
        /// The word that was given.
        given: String,
        /// Human list of accepted words, e.g. `scanbuff or scanfile`.
        choices: String,
    },

    /// No command is registered under the given name.
    #[error("invalid command name \"{0}\"")]
    UnknownCommand(String),

    /// The script could not be split into words.
    #[error("{0}")]
    Syntax(String),

    /// The command ran and failed.
    #[error("{0}")]
    Failed(String),
}

impl From<ScanError> for CommandError {
    fn from(err: ScanError) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Error returned while bringing a module instance up.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The configuration section could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The engine could not be reached or its database not loaded.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The interpreter pool refused the module.
    #[error(transparent)]
    Interp(#[from] CommandError),
}

/// A specialized `Result` type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
