//! Activity logger for scheduled runs.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::entry::{AuditEntry, AuditSink};
use crate::retention::{RunReport, RunStatus};

/// Writes every run report to the log and, if configured, to an audit sink.
///
/// Sink failures are logged and swallowed so auditing never breaks a run.
#[derive(Clone, Default)]
pub struct ActivityLogger {
    sink: Option<Arc<dyn AuditSink>>,
}

impl ActivityLogger {
    /// Logger that also writes to `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Logger that only emits tracing events.
    #[must_use]
    pub fn tracing_only() -> Self {
        Self::default()
    }

    /// Record the outcome of a run.
    pub async fn record(&self, report: &RunReport) {
        let entry = AuditEntry::from(report);
        let duration_ms = (report.finished_at - report.started_at).num_milliseconds();

        match report.status {
            RunStatus::Success if report.is_noop() => info!(
                job = %report.job,
                duration_ms,
                "Retention run found nothing to do"
            ),
            RunStatus::Success => info!(
                job = %report.job,
                eligible = report.eligible,
                succeeded = report.succeeded,
                records_updated = report.records_updated,
                duration_ms,
                "Retention run completed"
            ),
            RunStatus::Failure => {
                for failure in &report.failures {
                    warn!(job = %report.job, key = %failure.key, reason = %failure.reason, "Object not processed");
                }
                error!(
                    job = %report.job,
                    eligible = report.eligible,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    records_updated = report.records_updated,
                    error = report.error.as_deref().unwrap_or(""),
                    duration_ms,
                    "Retention run failed"
                );
            }
        }

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.record(&entry).await {
                error!(job = %report.job, entry_id = %entry.id, error = %e, "Failed to write audit entry");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activity::entry::{AuditError, MockAuditSink};
    use crate::retention::{JobKind, SchedulerRunError};
    use chrono::Utc;

    fn failed_report() -> RunReport {
        let now = Utc::now();
        RunReport::aborted(
            JobKind::SoftDeletePurge,
            now,
            now,
            &SchedulerRunError::Cancelled,
        )
    }

    #[tokio::test]
    async fn test_entry_written_to_sink() {
        let mut sink = MockAuditSink::new();
        sink.expect_record()
            .withf(|entry| {
                entry.job_type == "soft_delete_purge"
                    && entry.status == RunStatus::Failure
                    && entry.error.as_deref() == Some("run cancelled")
            })
            .times(1)
            .returning(|_| Ok(()));

        ActivityLogger::new(Arc::new(sink))
            .record(&failed_report())
            .await;
    }

    #[tokio::test]
    async fn test_sink_failure_is_swallowed() {
        let mut sink = MockAuditSink::new();
        sink.expect_record()
            .times(1)
            .returning(|_| Err(AuditError::Write("db down".to_string())));

        // Must not panic or propagate.
        ActivityLogger::new(Arc::new(sink))
            .record(&failed_report())
            .await;
    }

    #[tokio::test]
    async fn test_tracing_only() {
        ActivityLogger::tracing_only()
            .record(&failed_report())
            .await;
    }

    #[test]
    fn test_entry_from_report() {
        let mut report = RunReport::started(JobKind::TempCleanup, Utc::now());
        report.eligible = 3;
        report.succeeded = 3;
        report.finish(Utc::now());

        let entry = AuditEntry::from(&report);
        assert_eq!(entry.job_type, "temp_cleanup");
        assert_eq!(entry.eligible, 3);
        assert_eq!(entry.timestamp, report.finished_at);
        assert_eq!(entry.status, RunStatus::Success);
    }
}
