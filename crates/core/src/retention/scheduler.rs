//! Recurring retention jobs.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::clock::{Clock, SystemClock};
use super::config::RetentionConfig;
use super::error::SchedulerRunError;
use super::job::{JobKind, RunReport};
use super::record::{EligibilityQuery, RecordStore};
use super::trigger::Trigger;
use crate::activity::ActivityLogger;
use crate::storage::StorageService;

/// One "running" flag per job.
#[derive(Debug, Default)]
struct RunFlags {
    temp_cleanup: AtomicBool,
    soft_delete_purge: AtomicBool,
}

impl RunFlags {
    fn flag(&self, job: JobKind) -> &AtomicBool {
        match job {
            JobKind::TempCleanup => &self.temp_cleanup,
            JobKind::SoftDeletePurge => &self.soft_delete_purge,
        }
    }
}

/// Held while a job runs; clears the job's flag on drop, including on panic.
struct RunningGuard {
    flags: Arc<RunFlags>,
    job: JobKind,
}

impl RunningGuard {
    fn acquire(flags: &Arc<RunFlags>, job: JobKind) -> Option<Self> {
        flags
            .flag(job)
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flags: Arc::clone(flags),
                job,
            })
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.flags.flag(self.job).store(false, Ordering::Release);
    }
}

/// Drives the temp-cleanup and soft-delete-purge jobs.
///
/// Each job is `Idle` or `Running`. A trigger that fires while the same job is
/// still running is skipped. The two jobs touch disjoint records and may run
/// at the same time.
///
/// Assumes a single scheduler instance per record store; there is no
/// cross-process lock.
pub struct RetentionScheduler<R: RecordStore> {
    storage: Arc<dyn StorageService>,
    records: Arc<R>,
    activity: ActivityLogger,
    clock: Arc<dyn Clock>,
    config: RetentionConfig,
    running: Arc<RunFlags>,
}

impl<R: RecordStore> Clone for RetentionScheduler<R> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            records: Arc::clone(&self.records),
            activity: self.activity.clone(),
            clock: Arc::clone(&self.clock),
            config: self.config.clone(),
            running: Arc::clone(&self.running),
        }
    }
}

impl<R: RecordStore> RetentionScheduler<R> {
    /// Create a scheduler on the system clock.
    #[must_use]
    pub fn new(
        storage: Arc<dyn StorageService>,
        records: Arc<R>,
        activity: ActivityLogger,
        config: RetentionConfig,
    ) -> Self {
        Self {
            storage,
            records,
            activity,
            clock: Arc::new(SystemClock),
            config,
            running: Arc::new(RunFlags::default()),
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// Whether `job` is currently running.
    #[must_use]
    pub fn is_running(&self, job: JobKind) -> bool {
        self.running.flag(job).load(Ordering::Acquire)
    }

    /// Spawn one loop per job on its configured calendar schedule.
    ///
    /// The loops stop when `cancel` fires; runs already in progress finish
    /// first.
    #[must_use]
    pub fn start(&self, cancel: CancellationToken) -> SchedulerHandle {
        let tasks = JobKind::ALL
            .into_iter()
            .map(|job| {
                let trigger: Arc<dyn Trigger> = Arc::new(match job {
                    JobKind::TempCleanup => self.config.temp_schedule,
                    JobKind::SoftDeletePurge => self.config.purge_schedule,
                });
                self.spawn_job(job, trigger, cancel.clone())
            })
            .collect();
        SchedulerHandle { cancel, tasks }
    }

    /// Spawn the loop of one job with a custom trigger.
    pub fn spawn_job(
        &self,
        job: JobKind,
        trigger: Arc<dyn Trigger>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.job_loop(job, trigger, cancel).await })
    }

    async fn job_loop(self, job: JobKind, trigger: Arc<dyn Trigger>, cancel: CancellationToken) {
        let mut runs = JoinSet::new();

        loop {
            let Some(next) = trigger.next_fire(self.clock.now()) else {
                warn!(job = %job, "Trigger exhausted; job loop stopping");
                break;
            };
            info!(job = %job, next_run = %next, "Next retention run scheduled");

            tokio::select! {
                () = cancel.cancelled() => break,
                () = self.clock.sleep_until(next) => {}
            }

            // Runs are spawned so the loop keeps ticking while one is in
            // progress; an overlapping fire is then skipped by the guard.
            let this = self.clone();
            runs.spawn(async move {
                this.run_now(job).await;
            });
            while let Some(joined) = runs.try_join_next() {
                if let Err(e) = joined {
                    error!(job = %job, error = %e, "Run task failed");
                }
            }
        }

        debug!(job = %job, in_flight = runs.len(), "Job loop stopped; waiting for runs");
        while let Some(joined) = runs.join_next().await {
            if let Err(e) = joined {
                error!(job = %job, error = %e, "Run task failed");
            }
        }
    }

    /// Run `job` immediately.
    ///
    /// Returns `None` without doing anything if the job is already running.
    /// The run executes in its own task so a panic is contained and reported
    /// as a failed run.
    pub async fn run_now(&self, job: JobKind) -> Option<RunReport> {
        let Some(guard) = RunningGuard::acquire(&self.running, job) else {
            warn!(job = %job, "Previous run still in progress; skipping");
            return None;
        };

        let started_at = self.clock.now();
        let this = self.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            this.execute(job, started_at).await
        });

        let report = match task.await {
            Ok(report) => report,
            Err(e) => {
                let err = if e.is_panic() {
                    SchedulerRunError::Panicked(panic_message(e.into_panic().as_ref()))
                } else {
                    SchedulerRunError::Cancelled
                };
                RunReport::aborted(job, started_at, self.clock.now(), &err)
            }
        };

        self.activity.record(&report).await;
        Some(report)
    }

    async fn execute(&self, job: JobKind, started_at: DateTime<Utc>) -> RunReport {
        let mut report = RunReport::started(job, started_at);
        let outcome = match job {
            JobKind::TempCleanup => self.expire_temp(started_at, &mut report).await,
            JobKind::SoftDeletePurge => self.purge_deleted(started_at, &mut report).await,
        };
        if let Err(e) = outcome {
            report.abort(&e);
        }
        report.finish(self.clock.now());
        report
    }

    /// Delete provider objects of expired temp uploads and mark their
    /// records deleted.
    async fn expire_temp(
        &self,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) -> Result<(), SchedulerRunError> {
        let cutoff = now - self.config.temp_retention;
        let mut query = Some(EligibilityQuery::expired_temp(cutoff, self.config.page_size));
        while let Some(page) = query {
            let (confirmed, next) = self.delete_page(&page, report).await?;
            if !confirmed.is_empty() {
                report.records_updated += self
                    .records
                    .mark_deleted(&confirmed, self.clock.now())
                    .await?;
            }
            query = next;
        }
        Ok(())
    }

    /// Delete provider objects of long soft-deleted records, then compact the
    /// record store by removing those records.
    async fn purge_deleted(
        &self,
        now: DateTime<Utc>,
        report: &mut RunReport,
    ) -> Result<(), SchedulerRunError> {
        let cutoff = now - self.config.soft_delete_retention;
        let mut query = Some(EligibilityQuery::purgeable(cutoff, self.config.page_size));
        while let Some(page) = query {
            let (confirmed, next) = self.delete_page(&page, report).await?;
            if !confirmed.is_empty() {
                report.records_updated += self.records.purge(&confirmed).await?;
            }
            query = next;
        }
        Ok(())
    }

    /// Delete the objects of one page of records matching `query`.
    ///
    /// Returns the keys the provider confirmed and the query for the next
    /// page. Failed keys are left behind the cursor, so they never block
    /// newer records; they are retried by the next run.
    async fn delete_page(
        &self,
        query: &EligibilityQuery,
        report: &mut RunReport,
    ) -> Result<(Vec<String>, Option<EligibilityQuery>), SchedulerRunError> {
        let records = self.records.find_eligible(query).await?;
        report.eligible += records.len();
        let next = match records.last() {
            Some(last) if records.len() as u64 >= query.limit => query.next_page(last),
            _ => None,
        };
        if records.is_empty() {
            return Ok((Vec::new(), None));
        }

        info!(
            job = %report.job,
            page = records.len(),
            cutoff = %query.before,
            "Retention run processing records"
        );
        let keys: Vec<String> = records.into_iter().map(|r| r.key).collect();
        let batch = self.storage.delete_files(&keys).await;
        report.record_batch(&batch);

        let confirmed = batch.succeeded_keys().map(String::from).collect();
        Ok((confirmed, next))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Handle to the running job loops.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop scheduling new runs and wait for in-progress runs to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                error!(error = %e, "Job loop ended abnormally");
            }
        }
        info!("Retention scheduler stopped");
    }
}
