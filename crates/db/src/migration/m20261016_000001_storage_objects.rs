//! Storage object records.
//!
//! One row per provider object, with the lifecycle status the retention jobs
//! select on.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(STORAGE_OBJECTS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS storage_objects CASCADE;")
            .await?;
        Ok(())
    }
}

const STORAGE_OBJECTS_SQL: &str = r"
CREATE TABLE storage_objects (
    key VARCHAR(1024) PRIMARY KEY,
    url TEXT,
    size BIGINT NOT NULL DEFAULT 0,
    content_type VARCHAR(255),
    etag VARCHAR(255),
    last_modified TIMESTAMPTZ,
    status VARCHAR(16) NOT NULL DEFAULT 'temp',
    upload_time TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ,
    document_refs JSONB NOT NULL DEFAULT '[]'::jsonb,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_storage_objects_size CHECK (size >= 0),
    CONSTRAINT chk_storage_objects_status CHECK (status IN ('active', 'temp', 'deleted')),
    -- deleted_at is set exactly when the record is deleted
    CONSTRAINT chk_storage_objects_deleted_at CHECK ((status = 'deleted') = (deleted_at IS NOT NULL))
);

-- Weekly temp expiry scans
CREATE INDEX idx_storage_objects_temp ON storage_objects(upload_time) WHERE status = 'temp';

-- Monthly soft-delete purge scans
CREATE INDEX idx_storage_objects_deleted ON storage_objects(deleted_at) WHERE status = 'deleted';
";
