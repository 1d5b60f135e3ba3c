//! Persisted object records and the store the retention jobs query.

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    /// Attached to at least one document.
    Active,
    /// Uploaded but not yet claimed by a document.
    Temp,
    /// Soft-deleted; the provider object is purged later.
    Deleted,
}

impl ObjectStatus {
    /// Database representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Temp => "temp",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectStatus {
    type Err = RecordStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "temp" => Ok(Self::Temp),
            "deleted" => Ok(Self::Deleted),
            other => Err(RecordStoreError::Corrupt(format!(
                "unknown object status '{other}'"
            ))),
        }
    }
}

/// Metadata persisted for each stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObjectRecord {
    /// Provider-relative key; unique.
    pub key: String,
    /// Access URL derived at upload time.
    pub url: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// MIME type.
    pub content_type: Option<String>,
    /// Entity tag.
    pub etag: Option<String>,
    /// Last modification reported by the provider.
    pub last_modified: Option<DateTime<Utc>>,
    /// Lifecycle state.
    pub status: ObjectStatus,
    /// When the object was uploaded.
    pub upload_time: DateTime<Utc>,
    /// Set once, when the record enters [`ObjectStatus::Deleted`].
    pub deleted_at: Option<DateTime<Utc>>,
    /// Documents that link to this object. Weak references.
    pub references: Vec<String>,
}

/// Position after the last record of a page: records sort by
/// `(aged_at, key)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordCursor {
    /// Age timestamp of the last record returned.
    pub at: DateTime<Utc>,
    /// Key of the last record returned.
    pub key: String,
}

/// Selects records whose retention window has elapsed.
///
/// Temp records are aged by `upload_time`, deleted records by `deleted_at`.
/// The comparison is strict: a record exactly at `before` is not eligible.
/// Results are ordered by `(aged_at, key)` and start strictly after `after`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityQuery {
    /// Status to select.
    pub status: ObjectStatus,
    /// Cutoff instant.
    pub before: DateTime<Utc>,
    /// Maximum records returned.
    pub limit: u64,
    /// Resume point; `None` for the first page.
    pub after: Option<RecordCursor>,
}

impl EligibilityQuery {
    /// Temp uploads older than `cutoff`.
    #[must_use]
    pub fn expired_temp(before: DateTime<Utc>, limit: u64) -> Self {
        Self {
            status: ObjectStatus::Temp,
            before,
            limit,
            after: None,
        }
    }

    /// Soft-deleted records older than `cutoff`.
    #[must_use]
    pub fn purgeable(before: DateTime<Utc>, limit: u64) -> Self {
        Self {
            status: ObjectStatus::Deleted,
            before,
            limit,
            after: None,
        }
    }

    /// The timestamp `record` is aged by under this query.
    #[must_use]
    pub fn aged_at(&self, record: &StorageObjectRecord) -> Option<DateTime<Utc>> {
        match self.status {
            ObjectStatus::Deleted => record.deleted_at,
            ObjectStatus::Active | ObjectStatus::Temp => Some(record.upload_time),
        }
    }

    /// The same query, resuming after `last`.
    #[must_use]
    pub fn next_page(&self, last: &StorageObjectRecord) -> Option<Self> {
        let at = self.aged_at(last)?;
        Some(Self {
            after: Some(RecordCursor {
                at,
                key: last.key.clone(),
            }),
            ..self.clone()
        })
    }

    /// Whether `record` satisfies the query, ignoring `limit`.
    #[must_use]
    pub fn matches(&self, record: &StorageObjectRecord) -> bool {
        if record.status != self.status {
            return false;
        }
        let Some(at) = self.aged_at(record) else {
            return false;
        };
        if at >= self.before {
            return false;
        }
        match &self.after {
            Some(cursor) => (at, record.key.as_str()) > (cursor.at, cursor.key.as_str()),
            None => true,
        }
    }
}

/// Record store errors.
#[derive(Debug, Clone, Error)]
pub enum RecordStoreError {
    /// Store could not be reached.
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    /// Query or update failed.
    #[error("record store query failed: {0}")]
    Query(String),

    /// Stored data could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl RecordStoreError {
    /// Create a query error.
    #[must_use]
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }
}

/// Persistence seam for object records.
///
/// Implemented by the db crate.
pub trait RecordStore: Send + Sync + 'static {
    /// Records matching `query` ordered by `(aged_at, key)`, at most
    /// `query.limit`.
    fn find_eligible(
        &self,
        query: &EligibilityQuery,
    ) -> impl Future<Output = Result<Vec<StorageObjectRecord>, RecordStoreError>> + Send;

    /// Move records to [`ObjectStatus::Deleted`] with `deleted_at = at`.
    ///
    /// Records already deleted keep their original `deleted_at`. Returns the
    /// number of records changed.
    fn mark_deleted(
        &self,
        keys: &[String],
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, RecordStoreError>> + Send;

    /// Hard-delete soft-deleted records with the given keys. Returns the
    /// number of records removed.
    fn purge(&self, keys: &[String]) -> impl Future<Output = Result<u64, RecordStoreError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn record(status: ObjectStatus, upload_days_ago: i64, deleted_days_ago: Option<i64>) -> StorageObjectRecord {
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        StorageObjectRecord {
            key: "temp/a.pdf".to_string(),
            url: None,
            size: 1,
            content_type: None,
            etag: None,
            last_modified: None,
            status,
            upload_time: now - chrono::Duration::days(upload_days_ago),
            deleted_at: deleted_days_ago.map(|d| now - chrono::Duration::days(d)),
            references: Vec::new(),
        }
    }

    #[rstest]
    #[case("active", ObjectStatus::Active)]
    #[case("temp", ObjectStatus::Temp)]
    #[case("deleted", ObjectStatus::Deleted)]
    fn test_status_roundtrip(#[case] raw: &str, #[case] status: ObjectStatus) {
        assert_eq!(raw.parse::<ObjectStatus>().unwrap(), status);
        assert_eq!(status.to_string(), raw);
    }

    #[test]
    fn test_status_unknown() {
        assert!(matches!(
            "archived".parse::<ObjectStatus>(),
            Err(RecordStoreError::Corrupt(_))
        ));
    }

    #[test]
    fn test_expired_temp_query() {
        let cutoff = Utc.with_ymd_and_hms(2026, 5, 25, 0, 0, 0).unwrap();
        let query = EligibilityQuery::expired_temp(cutoff, 10);

        assert!(query.matches(&record(ObjectStatus::Temp, 8, None)));
        assert!(!query.matches(&record(ObjectStatus::Temp, 3, None)));
        // exactly at the cutoff is retained
        assert!(!query.matches(&record(ObjectStatus::Temp, 7, None)));
        assert!(!query.matches(&record(ObjectStatus::Active, 30, None)));
    }

    #[test]
    fn test_purgeable_query() {
        let cutoff = Utc.with_ymd_and_hms(2026, 5, 2, 0, 0, 0).unwrap();
        let query = EligibilityQuery::purgeable(cutoff, 10);

        assert!(query.matches(&record(ObjectStatus::Deleted, 60, Some(31))));
        assert!(!query.matches(&record(ObjectStatus::Deleted, 60, Some(29))));
        assert!(!query.matches(&record(ObjectStatus::Deleted, 60, None)));
        assert!(!query.matches(&record(ObjectStatus::Temp, 60, None)));
    }

    #[test]
    fn test_next_page_skips_up_to_cursor() {
        let cutoff = Utc.with_ymd_and_hms(2026, 5, 25, 0, 0, 0).unwrap();
        let query = EligibilityQuery::expired_temp(cutoff, 10);
        let last = record(ObjectStatus::Temp, 10, None);
        let next = query.next_page(&last).unwrap();

        assert!(!next.matches(&last));
        // same timestamp, later key
        let sibling = StorageObjectRecord {
            key: "temp/b.pdf".to_string(),
            ..last.clone()
        };
        assert!(next.matches(&sibling));
        // older records were on earlier pages
        assert!(!next.matches(&record(ObjectStatus::Temp, 11, None)));
        assert!(next.matches(&record(ObjectStatus::Temp, 9, None)));
    }
}
