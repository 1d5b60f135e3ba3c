//! Value objects exchanged through the storage contract.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-specific write extensions.
///
/// Applied only when the variant matches the configured provider; a mismatched
/// variant is ignored with a warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum ProviderExtra {
    /// S3-compatible extensions.
    S3 {
        /// Fail the write if the key already exists (`If-None-Match: *`).
        #[serde(default)]
        if_not_exists: bool,
    },
    /// Aliyun OSS extensions.
    Oss {
        /// Fail the write if the key already exists (`x-oss-forbid-overwrite`).
        #[serde(default)]
        if_not_exists: bool,
    },
}

impl ProviderExtra {
    /// Provider name this extension applies to.
    #[must_use]
    pub fn provider(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::Oss { .. } => "oss",
        }
    }

    /// Whether the write must not overwrite.
    #[must_use]
    pub fn if_not_exists(&self) -> bool {
        match self {
            Self::S3 { if_not_exists } | Self::Oss { if_not_exists } => *if_not_exists,
        }
    }
}

/// Options for writes, copies and signed upload URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOptions {
    /// MIME type of the content.
    pub content_type: Option<String>,
    /// `Cache-Control` header stored with the object.
    pub cache_control: Option<String>,
    /// `Content-Disposition` header stored with the object.
    pub content_disposition: Option<String>,
    /// Custom user metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Object tags, persisted as `tag-*` user metadata.
    #[serde(default)]
    pub tags: HashMap<String, String>,
    /// Provider-specific extensions.
    pub extra: Option<ProviderExtra>,
}

impl UploadOptions {
    /// Options with only a content type.
    #[must_use]
    pub fn with_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }

    /// User metadata with tags merged in under the `tag-` prefix.
    #[must_use]
    pub fn user_metadata(&self) -> HashMap<String, String> {
        let mut merged = self.metadata.clone();
        for (k, v) in &self.tags {
            merged.insert(format!("tag-{k}"), v.clone());
        }
        merged
    }
}

/// Outcome of a write (upload, copy or move).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    /// Whether the write succeeded.
    pub success: bool,
    /// Key that was written.
    pub key: String,
    /// Access URL of the object, when one could be derived.
    pub url: Option<String>,
    /// Size in bytes; `None` when unknown (stream uploads).
    pub size: Option<u64>,
    /// Entity tag reported by the provider.
    pub etag: Option<String>,
    /// Failure reason.
    pub error: Option<String>,
}

impl UploadResult {
    /// A successful write.
    #[must_use]
    pub fn succeeded(key: impl Into<String>, size: Option<u64>) -> Self {
        Self {
            success: true,
            key: key.into(),
            url: None,
            size,
            etag: None,
            error: None,
        }
    }

    /// A failed write.
    #[must_use]
    pub fn failed(key: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            key: key.into(),
            url: None,
            size: None,
            etag: None,
            error: Some(error.into()),
        }
    }
}

/// Identity and metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Object key.
    pub key: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type.
    pub content_type: Option<String>,
    /// Entity tag.
    pub etag: Option<String>,
    /// Last modification time, if the provider reports one.
    pub last_modified: Option<DateTime<Utc>>,
    /// Custom user metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Parameters of a paginated listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// Only list keys under this prefix.
    pub prefix: Option<String>,
    /// Group keys by this delimiter; only `/` is supported.
    pub delimiter: Option<String>,
    /// Page size.
    pub max_keys: usize,
    /// Token returned by the previous page.
    pub continuation_token: Option<String>,
}

impl ListOptions {
    /// Default page size.
    pub const DEFAULT_MAX_KEYS: usize = 1000;

    /// List everything under `prefix`.
    #[must_use]
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            ..Self::default()
        }
    }
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            prefix: None,
            delimiter: None,
            max_keys: Self::DEFAULT_MAX_KEYS,
            continuation_token: None,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResult {
    /// Objects on this page, in key order.
    pub files: Vec<FileInfo>,
    /// `false` when the listing is exhausted.
    pub is_truncated: bool,
    /// Input for the next call when truncated.
    pub continuation_token: Option<String>,
    /// Sub-prefixes when a delimiter was given.
    pub common_prefixes: Vec<String>,
}

/// Aggregate bucket usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStats {
    /// Number of objects counted.
    pub total_files: u64,
    /// Sum of object sizes counted, in bytes.
    pub total_size: u64,
    /// Space used, in bytes. Equal to `total_size` for providers without
    /// replication overhead reporting.
    pub used_space: u64,
    /// When the stats were computed.
    pub last_updated: DateTime<Utc>,
    /// `true` when the listing hit the sample limit, so the numbers are a
    /// lower bound.
    pub is_approximate: bool,
}

/// Outcome for one key of a batch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItemResult {
    /// The requested key.
    pub key: String,
    /// Whether the operation succeeded for this key.
    pub success: bool,
    /// Failure reason.
    pub error: Option<String>,
}

impl BatchItemResult {
    /// A successful item.
    #[must_use]
    pub fn ok(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            success: true,
            error: None,
        }
    }

    /// A failed item.
    #[must_use]
    pub fn failed(key: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Aggregate of a batch operation.
///
/// `results` always has one entry per requested key, in request order. When
/// the operation could not determine its keys at all, `error` is set and
/// `success` is `false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOperationResult {
    /// `true` when every key succeeded (also for an empty batch).
    pub success: bool,
    /// Keys that succeeded.
    pub success_count: usize,
    /// Keys that failed.
    pub failure_count: usize,
    /// Keys requested.
    pub total_count: usize,
    /// Per-key outcomes.
    pub results: Vec<BatchItemResult>,
    /// Why the operation stopped before any key was attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOperationResult {
    /// Aggregate per-key outcomes.
    #[must_use]
    pub fn from_results(results: Vec<BatchItemResult>) -> Self {
        let total_count = results.len();
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            success: success_count == total_count,
            success_count,
            failure_count: total_count - success_count,
            total_count,
            results,
            error: None,
        }
    }

    /// An operation that failed before any key was attempted.
    #[must_use]
    pub fn aborted(error: impl Into<String>) -> Self {
        Self {
            success: false,
            success_count: 0,
            failure_count: 0,
            total_count: 0,
            results: Vec::new(),
            error: Some(error.into()),
        }
    }

    /// Keys that succeeded, in request order.
    pub fn succeeded_keys(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| r.success)
            .map(|r| r.key.as_str())
    }

    /// Failed items, in request order.
    pub fn failures(&self) -> impl Iterator<Item = &BatchItemResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_is_success() {
        let result = BatchOperationResult::from_results(Vec::new());
        assert!(result.success);
        assert_eq!(result.total_count, 0);
        assert_eq!(result.success_count, 0);
        assert_eq!(result.failure_count, 0);
    }

    #[test]
    fn test_mixed_batch_counts() {
        let result = BatchOperationResult::from_results(vec![
            BatchItemResult::ok("a"),
            BatchItemResult::failed("b", "denied"),
            BatchItemResult::ok("c"),
        ]);
        assert!(!result.success);
        assert_eq!(result.success_count, 2);
        assert_eq!(result.failure_count, 1);
        assert_eq!(result.succeeded_keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(result.failures().next().map(|f| f.key.as_str()), Some("b"));
    }

    #[test]
    fn test_aborted_batch_is_not_success() {
        let result = BatchOperationResult::aborted("listing timed out");
        assert!(!result.success);
        assert_eq!(result.total_count, 0);
        assert_eq!(result.error.as_deref(), Some("listing timed out"));
        assert!(BatchOperationResult::from_results(Vec::new()).error.is_none());
    }

    #[test]
    fn test_user_metadata_merges_tags() {
        let mut options = UploadOptions::with_content_type("application/pdf");
        options.metadata.insert("owner".into(), "doc-42".into());
        options.tags.insert("model".into(), "x5".into());

        let merged = options.user_metadata();
        assert_eq!(merged.get("owner").map(String::as_str), Some("doc-42"));
        assert_eq!(merged.get("tag-model").map(String::as_str), Some("x5"));
    }

    #[test]
    fn test_provider_extra_serde() {
        let extra: ProviderExtra =
            serde_json::from_str(r#"{"provider":"s3","if_not_exists":true}"#).expect("valid");
        assert_eq!(extra.provider(), "s3");
        assert!(extra.if_not_exists());
    }
}
