//! Audit trail of scheduled retention runs.

mod entry;
mod logger;

pub use entry::{AuditEntry, AuditError, AuditSink};
pub use logger::ActivityLogger;
