//! Audit trail of retention runs.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ACTIVITY_LOGS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS storage_activity_logs CASCADE;")
            .await?;
        Ok(())
    }
}

const ACTIVITY_LOGS_SQL: &str = r"
CREATE TABLE storage_activity_logs (
    id UUID PRIMARY KEY,
    job_type VARCHAR(64) NOT NULL,
    status VARCHAR(16) NOT NULL,
    eligible BIGINT NOT NULL DEFAULT 0,
    succeeded BIGINT NOT NULL DEFAULT 0,
    failed BIGINT NOT NULL DEFAULT 0,
    failures JSONB NOT NULL DEFAULT '[]'::jsonb,
    error TEXT,
    started_at TIMESTAMPTZ NOT NULL,
    logged_at TIMESTAMPTZ NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_activity_status CHECK (status IN ('success', 'failure')),
    CONSTRAINT chk_activity_window CHECK (logged_at >= started_at)
);

-- Latest runs per job
CREATE INDEX idx_activity_job_time ON storage_activity_logs(job_type, logged_at DESC);
";
