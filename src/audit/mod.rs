//! Structured audit logging.
//!
//! Audit events go through `tracing` on the `clamcmd::audit` target, so a
//! subscriber can route them separately from diagnostic logs (for example
//! to a JSON file). The event structs serialize to the same fields for
//! sinks that want to store them directly.

mod events;

pub use events::{
    emit_engine_loaded, emit_scan_completed, emit_scan_failed, AuditEvent, EngineLoadedEvent,
    ScanAuditEvent, ScanFailedEvent, AUDIT_TARGET,
};
