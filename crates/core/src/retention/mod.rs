//! Scheduled retention: temp-upload expiry and soft-delete purge.
//!
//! ```text
//! Trigger ──fires──▶ RetentionScheduler ──query──▶ RecordStore
//!                        │                            ▲
//!                        ├──delete_files──▶ StorageService
//!                        │                            │
//!                        ├──mark_deleted / purge──────┘
//!                        └──RunReport──▶ ActivityLogger
//! ```

mod clock;
mod config;
mod error;
mod job;
mod record;
mod scheduler;
mod trigger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RetentionConfig;
pub use error::{RetentionConfigError, SchedulerRunError};
pub use job::{ItemFailure, JobKind, RunReport, RunStatus};
pub use record::{
    EligibilityQuery, ObjectStatus, RecordCursor, RecordStore, RecordStoreError,
    StorageObjectRecord,
};
pub use scheduler::{RetentionScheduler, SchedulerHandle};
pub use trigger::{CalendarSchedule, Trigger};
