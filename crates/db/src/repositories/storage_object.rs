//! Storage object repository for database operations.
//!
//! Implements the retention record store using SeaORM.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::debug;

use crate::entities::storage_objects;
use autodocs_core::retention::{
    EligibilityQuery, ObjectStatus, RecordStore, RecordStoreError, StorageObjectRecord,
};

/// Keys bound per statement.
const KEYS_PER_STATEMENT: usize = 1000;

/// Storage object repository implementation.
#[derive(Debug, Clone)]
pub struct StorageObjectRepository {
    db: DatabaseConnection,
}

impl StorageObjectRepository {
    /// Create a new storage object repository.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the key already exists or the database fails.
    pub async fn insert(
        &self,
        record: &StorageObjectRecord,
    ) -> Result<StorageObjectRecord, RecordStoreError> {
        let now = Utc::now();
        let active_model = storage_objects::ActiveModel {
            key: Set(record.key.clone()),
            url: Set(record.url.clone()),
            size: Set(i64::try_from(record.size).unwrap_or(i64::MAX)),
            content_type: Set(record.content_type.clone()),
            etag: Set(record.etag.clone()),
            last_modified: Set(record.last_modified.map(Into::into)),
            status: Set(record.status.as_str().to_string()),
            upload_time: Set(record.upload_time.into()),
            deleted_at: Set(record.deleted_at.map(Into::into)),
            document_refs: Set(serde_json::json!(record.references)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let model = active_model.insert(&self.db).await.map_err(store_error)?;
        to_domain(model)
    }

    /// Find a record by key.
    ///
    /// # Errors
    ///
    /// Returns an error if the database fails or the row is corrupt.
    pub async fn find_by_key(
        &self,
        key: &str,
    ) -> Result<Option<StorageObjectRecord>, RecordStoreError> {
        storage_objects::Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await
            .map_err(store_error)?
            .map(to_domain)
            .transpose()
    }

    /// Soft-delete one record by explicit request.
    ///
    /// Returns `false` if the record does not exist or is already deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database fails.
    pub async fn soft_delete(&self, key: &str, at: DateTime<Utc>) -> Result<bool, RecordStoreError> {
        let changed = self.mark_deleted(&[key.to_string()], at).await?;
        Ok(changed > 0)
    }
}

impl RecordStore for StorageObjectRepository {
    async fn find_eligible(
        &self,
        query: &EligibilityQuery,
    ) -> Result<Vec<StorageObjectRecord>, RecordStoreError> {
        let aged_at = match query.status {
            ObjectStatus::Deleted => storage_objects::Column::DeletedAt,
            ObjectStatus::Active | ObjectStatus::Temp => storage_objects::Column::UploadTime,
        };
        let mut select = storage_objects::Entity::find()
            .filter(storage_objects::Column::Status.eq(query.status.as_str()))
            .filter(aged_at.lt(query.before));
        if let Some(cursor) = &query.after {
            select = select.filter(
                Condition::any().add(aged_at.gt(cursor.at)).add(
                    Condition::all()
                        .add(aged_at.eq(cursor.at))
                        .add(storage_objects::Column::Key.gt(cursor.key.as_str())),
                ),
            );
        }
        let select = select
            .order_by_asc(aged_at)
            .order_by_asc(storage_objects::Column::Key);

        let models = select
            .limit(query.limit)
            .all(&self.db)
            .await
            .map_err(store_error)?;

        models.into_iter().map(to_domain).collect()
    }

    async fn mark_deleted(
        &self,
        keys: &[String],
        at: DateTime<Utc>,
    ) -> Result<u64, RecordStoreError> {
        let mut changed = 0;
        for chunk in keys.chunks(KEYS_PER_STATEMENT) {
            let result = storage_objects::Entity::update_many()
                .col_expr(
                    storage_objects::Column::Status,
                    Expr::value(ObjectStatus::Deleted.as_str()),
                )
                .col_expr(storage_objects::Column::DeletedAt, Expr::value(at))
                .col_expr(storage_objects::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(storage_objects::Column::Key.is_in(chunk.iter().cloned()))
                .filter(storage_objects::Column::Status.ne(ObjectStatus::Deleted.as_str()))
                .exec(&self.db)
                .await
                .map_err(store_error)?;
            changed += result.rows_affected;
        }
        debug!(requested = keys.len(), changed, "Marked storage records deleted");
        Ok(changed)
    }

    async fn purge(&self, keys: &[String]) -> Result<u64, RecordStoreError> {
        let mut removed = 0;
        for chunk in keys.chunks(KEYS_PER_STATEMENT) {
            let result = storage_objects::Entity::delete_many()
                .filter(storage_objects::Column::Key.is_in(chunk.iter().cloned()))
                .filter(storage_objects::Column::Status.eq(ObjectStatus::Deleted.as_str()))
                .exec(&self.db)
                .await
                .map_err(store_error)?;
            removed += result.rows_affected;
        }
        debug!(requested = keys.len(), removed, "Purged storage records");
        Ok(removed)
    }
}

fn store_error(e: DbErr) -> RecordStoreError {
    match e {
        DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => {
            RecordStoreError::Unavailable(e.to_string())
        }
        _ => RecordStoreError::query(e.to_string()),
    }
}

/// Convert database model to domain model.
fn to_domain(model: storage_objects::Model) -> Result<StorageObjectRecord, RecordStoreError> {
    let status = model.status.parse::<ObjectStatus>()?;
    let references: Vec<String> = serde_json::from_value(model.document_refs).map_err(|e| {
        RecordStoreError::Corrupt(format!("document_refs of '{}': {e}", model.key))
    })?;

    Ok(StorageObjectRecord {
        key: model.key,
        url: model.url,
        size: u64::try_from(model.size).unwrap_or(0),
        content_type: model.content_type,
        etag: model.etag,
        last_modified: model.last_modified.map(|t| t.with_timezone(&Utc)),
        status,
        upload_time: model.upload_time.with_timezone(&Utc),
        deleted_at: model.deleted_at.map(|t| t.with_timezone(&Utc)),
        references,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(status: &str, refs: serde_json::Value) -> storage_objects::Model {
        let now = Utc::now().fixed_offset();
        storage_objects::Model {
            key: "manuals/a.pdf".to_string(),
            url: None,
            size: 42,
            content_type: Some("application/pdf".to_string()),
            etag: None,
            last_modified: None,
            status: status.to_string(),
            upload_time: now,
            deleted_at: None,
            document_refs: refs,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_to_domain() {
        let record = to_domain(model("active", serde_json::json!(["doc-1", "doc-2"]))).unwrap();
        assert_eq!(record.status, ObjectStatus::Active);
        assert_eq!(record.size, 42);
        assert_eq!(record.references, vec!["doc-1", "doc-2"]);
    }

    #[test]
    fn test_to_domain_rejects_bad_rows() {
        assert!(matches!(
            to_domain(model("archived", serde_json::json!([]))),
            Err(RecordStoreError::Corrupt(_))
        ));
        assert!(matches!(
            to_domain(model("temp", serde_json::json!({"doc": 1}))),
            Err(RecordStoreError::Corrupt(_))
        ));
    }
}
