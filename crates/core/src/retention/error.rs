//! Retention error types.

use thiserror::Error;

use super::record::RecordStoreError;

/// Invalid retention or schedule settings.
#[derive(Debug, Clone, Error)]
#[error("invalid retention configuration: {0}")]
pub struct RetentionConfigError(String);

impl RetentionConfigError {
    /// Create a configuration error.
    #[must_use]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// Why a scheduled run aborted.
///
/// Caught at the top of every run and recorded in the run report; never
/// propagated out of the scheduler.
#[derive(Debug, Clone, Error)]
pub enum SchedulerRunError {
    /// Record store query or update failed.
    #[error(transparent)]
    RecordStore(#[from] RecordStoreError),

    /// The run panicked.
    #[error("run panicked: {0}")]
    Panicked(String),

    /// The run task was cancelled before it finished.
    #[error("run cancelled")]
    Cancelled,
}
