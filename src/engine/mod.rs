//! Scanning engine implementations.
//!
//! - [`clamd`] - the ClamAV daemon over its socket protocol
//! - [`mock`] - an in-process fake for tests and demos
//!
//! A new engine only needs to implement [`Scanner`](crate::core::Scanner);
//! the module and command layers work with any `ArcScanner`.

pub mod clamd;
pub mod mock;

pub use clamd::{BufferMode, ClamdConfig, ClamdScanner, Endpoint, FileMode};
pub use mock::MockScanner;
