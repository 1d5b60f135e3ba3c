//! Activity log repository for database operations.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::entities::storage_activity_logs;
use autodocs_core::activity::{AuditEntry, AuditError, AuditSink};

/// Audit sink backed by the `storage_activity_logs` table.
#[derive(Debug, Clone)]
pub struct ActivityLogRepository {
    db: DatabaseConnection,
}

impl ActivityLogRepository {
    /// Create a new activity log repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Latest entries of one job, newest first. For operators and tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database fails.
    pub async fn recent(
        &self,
        job_type: &str,
        limit: u64,
    ) -> Result<Vec<storage_activity_logs::Model>, DbErr> {
        storage_activity_logs::Entity::find()
            .filter(storage_activity_logs::Column::JobType.eq(job_type))
            .order_by_desc(storage_activity_logs::Column::LoggedAt)
            .limit(limit)
            .all(&self.db)
            .await
    }
}

#[async_trait]
impl AuditSink for ActivityLogRepository {
    async fn record(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        let failures =
            serde_json::to_value(&entry.failures).map_err(|e| AuditError::Write(e.to_string()))?;

        let active_model = storage_activity_logs::ActiveModel {
            id: Set(entry.id),
            job_type: Set(entry.job_type.clone()),
            status: Set(entry.status.as_str().to_string()),
            eligible: Set(to_i64(entry.eligible)),
            succeeded: Set(to_i64(entry.succeeded)),
            failed: Set(to_i64(entry.failed)),
            failures: Set(failures),
            error: Set(entry.error.clone()),
            started_at: Set(entry.started_at.into()),
            logged_at: Set(entry.timestamp.into()),
            created_at: Set(chrono::Utc::now().into()),
        };

        active_model
            .insert(&self.db)
            .await
            .map_err(|e| AuditError::Write(e.to_string()))?;
        Ok(())
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
