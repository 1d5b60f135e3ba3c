//! Retention jobs and their run reports.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::SchedulerRunError;
use crate::storage::BatchOperationResult;

/// Named recurring jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Weekly expiry of unclaimed temp uploads.
    TempCleanup,
    /// Monthly purge and compaction of soft-deleted objects.
    SoftDeletePurge,
}

impl JobKind {
    /// All jobs, in scheduling order.
    pub const ALL: [Self; 2] = [Self::TempCleanup, Self::SoftDeletePurge];

    /// Stable name used in logs and audit entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TempCleanup => "temp_cleanup",
            Self::SoftDeletePurge => "soft_delete_purge",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every eligible object was processed.
    Success,
    /// The run aborted or at least one object failed.
    Failure,
}

impl RunStatus {
    /// Stable name used in logs and audit entries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }
}

/// A key the run could not process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// Object key.
    pub key: String,
    /// Failure reason.
    pub reason: String,
}

/// Summary of one run; the payload of its audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Job that ran.
    pub job: JobKind,
    /// Final status.
    pub status: RunStatus,
    /// Records selected for processing.
    pub eligible: usize,
    /// Objects deleted from the provider.
    pub succeeded: usize,
    /// Objects the provider did not delete.
    pub failed: usize,
    /// Per-key failure reasons.
    pub failures: Vec<ItemFailure>,
    /// Records transitioned or removed in the record store.
    pub records_updated: u64,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub finished_at: DateTime<Utc>,
    /// Why the run aborted, if it did.
    pub error: Option<String>,
}

impl RunReport {
    /// Empty report for a run starting at `started_at`.
    #[must_use]
    pub fn started(job: JobKind, started_at: DateTime<Utc>) -> Self {
        Self {
            job,
            status: RunStatus::Success,
            eligible: 0,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            records_updated: 0,
            started_at,
            finished_at: started_at,
            error: None,
        }
    }

    /// Report for a run that never produced a result.
    #[must_use]
    pub fn aborted(
        job: JobKind,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        error: &SchedulerRunError,
    ) -> Self {
        let mut report = Self::started(job, started_at);
        report.abort(error);
        report.finish(finished_at);
        report
    }

    /// Fold in the provider outcome.
    pub fn record_batch(&mut self, batch: &BatchOperationResult) {
        self.succeeded += batch.success_count;
        self.failed += batch.failure_count;
        self.failures.extend(batch.failures().map(|f| ItemFailure {
            key: f.key.clone(),
            reason: f.error.clone().unwrap_or_default(),
        }));
        if let Some(error) = &batch.error {
            self.error.get_or_insert_with(|| error.clone());
        }
    }

    /// Mark the run as aborted.
    pub fn abort(&mut self, error: &SchedulerRunError) {
        self.error = Some(error.to_string());
    }

    /// Close the report and derive its status.
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = finished_at;
        self.status = if self.error.is_some() || self.failed > 0 {
            RunStatus::Failure
        } else {
            RunStatus::Success
        };
    }

    /// Whether the run found nothing to do.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.eligible == 0 && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::BatchItemResult;

    #[test]
    fn test_partial_batch_is_failure() {
        let now = Utc::now();
        let mut report = RunReport::started(JobKind::TempCleanup, now);
        report.eligible = 2;
        report.record_batch(&BatchOperationResult::from_results(vec![
            BatchItemResult::ok("temp/a"),
            BatchItemResult::failed("temp/b", "access denied"),
        ]));
        report.finish(now);

        assert_eq!(report.status, RunStatus::Failure);
        assert_eq!(report.succeeded, 1);
        assert_eq!(
            report.failures,
            vec![ItemFailure {
                key: "temp/b".to_string(),
                reason: "access denied".to_string(),
            }]
        );
    }

    #[test]
    fn test_aborted_batch_fails_the_run() {
        let now = Utc::now();
        let mut report = RunReport::started(JobKind::TempCleanup, now);
        report.record_batch(&BatchOperationResult::aborted("provider unreachable"));
        report.finish(now);

        assert_eq!(report.status, RunStatus::Failure);
        assert_eq!(report.error.as_deref(), Some("provider unreachable"));
    }

    #[test]
    fn test_empty_run_is_noop_success() {
        let now = Utc::now();
        let mut report = RunReport::started(JobKind::SoftDeletePurge, now);
        report.finish(now);

        assert!(report.is_noop());
        assert_eq!(report.status, RunStatus::Success);
    }

    #[test]
    fn test_aborted_report() {
        let now = Utc::now();
        let report = RunReport::aborted(
            JobKind::TempCleanup,
            now,
            now,
            &SchedulerRunError::Panicked("boom".to_string()),
        );
        assert_eq!(report.status, RunStatus::Failure);
        assert_eq!(report.error.as_deref(), Some("run panicked: boom"));
        assert!(!report.is_noop());
    }

    #[test]
    fn test_job_names() {
        assert_eq!(JobKind::TempCleanup.to_string(), "temp_cleanup");
        assert_eq!(
            serde_json::to_string(&JobKind::SoftDeletePurge).unwrap(),
            "\"soft_delete_purge\""
        );
    }
}
