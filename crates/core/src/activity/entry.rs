//! Audit entries and the sink they are written to.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::retention::{ItemFailure, RunReport, RunStatus};

/// One audit record per scheduled run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry ID (UUIDv7, time-ordered).
    pub id: Uuid,
    /// Job name, e.g. `temp_cleanup`.
    pub job_type: String,
    /// Run status.
    pub status: RunStatus,
    /// Records selected.
    pub eligible: u64,
    /// Objects deleted.
    pub succeeded: u64,
    /// Objects not deleted.
    pub failed: u64,
    /// Per-key failure reasons.
    pub failures: Vec<ItemFailure>,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end; the entry timestamp.
    pub timestamp: DateTime<Utc>,
    /// Abort reason.
    pub error: Option<String>,
}

impl From<&RunReport> for AuditEntry {
    fn from(report: &RunReport) -> Self {
        Self {
            id: Uuid::now_v7(),
            job_type: report.job.as_str().to_string(),
            status: report.status,
            eligible: report.eligible as u64,
            succeeded: report.succeeded as u64,
            failed: report.failed as u64,
            failures: report.failures.clone(),
            started_at: report.started_at,
            timestamp: report.finished_at,
            error: report.error.clone(),
        }
    }
}

/// Audit sink errors.
#[derive(Debug, Clone, Error)]
pub enum AuditError {
    /// The entry could not be written.
    #[error("audit write failed: {0}")]
    Write(String),
}

/// Write-only destination for audit entries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Persist one entry.
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}
