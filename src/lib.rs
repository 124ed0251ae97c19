//! # clamcmd
//!
//! ClamAV virus scanning exposed as an interpreter command.
//!
//! ## Overview
//!
//! A server loads the module once at startup. The module reads its
//! configuration section, has the engine load its signature database and
//! then registers `ns_clamav` in every interpreter of the server:
//!
//! ```text
//! ns_clamav scanbuff <string>   -> virus name, or "" when clean
//! ns_clamav scanfile <path>     -> virus name, or "" when clean
//! ```
//!
//! Engine errors surface as the command's error result.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clamcmd::prelude::*;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_file(Path::new("/etc/clamcmd.toml"))?;
//!     let pool = InterpPool::new("main");
//!
//!     ClamAvModule::init_clamd(&pool, "nsclamav", &config).await?;
//!
//!     let interp = pool.create_interp()?;
//!     let virus = interp.eval("ns_clamav scanfile /tmp/upload.bin").await?;
//!     if virus.is_empty() {
//!         println!("clean");
//!     } else {
//!         println!("infected: {virus}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `sha256` - Also compute SHA256 hashes of scanned content
//!
//! ## Architecture
//!
//! - **Core**: Outcomes, limits, errors and the `Scanner` engine trait
//! - **Engine**: The clamd backend and an in-process mock
//! - **Config**: TOML module sections
//! - **Interp**: Command table, script evaluation, interpreter pool
//! - **Module**: Startup routine and scan entry points
//! - **Command**: `ns_clamav` itself
//! - **Audit**: Structured logging of loads and scans

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod command;
pub mod config;
pub mod core;
pub mod engine;
pub mod interp;
pub mod module;

// Re-export commonly used types at the crate root
pub use crate::core::{
    CommandError, ConfigError, DatabaseInfo, FileHash, FileHasher, FileInput, FileMetadata,
    ModuleError, ScanError, ScanLimits, ScanOptions, ScanOutcome, ScanResult, ScanSettings,
    Scanner,
};

pub use crate::command::{ClamAvCommand, COMMAND_NAME};
pub use crate::config::{Config, ModuleConfig};
pub use crate::engine::{ClamdConfig, ClamdScanner, MockScanner};
pub use crate::interp::{Command, Interp, InterpPool};
pub use crate::module::ClamAvModule;

/// Prelude module for convenient imports.
///
/// ```rust
/// use clamcmd::prelude::*;
/// ```
pub mod prelude {
    pub use crate::command::COMMAND_NAME;
    pub use crate::config::{Config, ModuleConfig};
    pub use crate::core::{
        ArcScanner, CommandError, DatabaseInfo, FileInput, ModuleError, ScanError, ScanLimits,
        ScanOutcome, ScanResult, Scanner,
    };
    pub use crate::engine::{ClamdConfig, ClamdScanner, MockScanner};
    pub use crate::interp::{Interp, InterpPool};
    pub use crate::module::ClamAvModule;
}
