//! Core types and traits for the clamcmd library.
//!
//! - [`types`] - Outcomes, limits, options, hashes
//! - [`traits`] - The `Scanner` engine trait
//! - [`error`] - Structured error types
//! - [`input`] - Buffer/path input abstraction
//! - [`hasher`] - BLAKE3 content hashing
//! - [`result`] - Scan result structure

pub mod error;
pub mod hasher;
pub mod input;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{CommandError, ConfigError, ModuleError, ScanError};
pub use hasher::FileHasher;
pub use input::FileInput;
pub use result::ScanResult;
pub use traits::{ArcScanner, Scanner};
pub use types::{
    DatabaseInfo, FileHash, FileMetadata, ScanLimits, ScanOptions, ScanOutcome, ScanSettings,
};
