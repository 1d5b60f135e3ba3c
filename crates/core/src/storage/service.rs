//! Provider-agnostic storage contract.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use super::error::StorageError;
use super::types::{
    BatchOperationResult, FileInfo, ListOptions, ListResult, StorageStats, UploadOptions,
    UploadResult,
};

/// A stream of content chunks.
pub type ByteStream = BoxStream<'static, Result<Bytes, StorageError>>;

/// Default lifetime of read URLs: 1 hour.
pub const DEFAULT_URL_EXPIRY: Duration = Duration::from_secs(3600);

/// Default age after which temp-namespace objects are swept by `cleanup`.
pub const DEFAULT_CLEANUP_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// Operations every storage provider adapter implements.
///
/// Error conventions:
/// - writes, deletes and listings that can partially succeed report failure
///   in their result value;
/// - single-object reads, signing and initialization return `Err`;
/// - invalid keys are rejected with [`StorageError::InvalidKey`] before any
///   provider call.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Establish the provider session. Calling it again once initialized is a
    /// no-op.
    async fn initialize(&self) -> Result<(), StorageError>;

    /// Write `data` under `key`.
    async fn upload_file(
        &self,
        data: Bytes,
        key: &str,
        options: Option<UploadOptions>,
    ) -> Result<UploadResult, StorageError>;

    /// Write a stream under `key`. The reported size is `None`.
    async fn upload_stream(
        &self,
        stream: ByteStream,
        key: &str,
        options: Option<UploadOptions>,
    ) -> Result<UploadResult, StorageError>;

    /// Read a whole object.
    async fn download_file(&self, key: &str) -> Result<Bytes, StorageError>;

    /// Read an object as a stream.
    async fn get_file_stream(&self, key: &str) -> Result<ByteStream, StorageError>;

    /// Fetch object metadata.
    async fn get_file_info(&self, key: &str) -> Result<FileInfo, StorageError>;

    /// Whether an object exists. Provider errors count as `false`.
    async fn file_exists(&self, key: &str) -> bool;

    /// Access URL for reading. Unsigned and deterministic when a custom domain
    /// is configured; otherwise signed and valid for `expires_in`
    /// (default [`DEFAULT_URL_EXPIRY`]).
    async fn get_file_url(
        &self,
        key: &str,
        expires_in: Option<Duration>,
    ) -> Result<String, StorageError>;

    /// Signed URL for a direct `PUT` upload.
    async fn get_signed_upload_url(
        &self,
        key: &str,
        expires_in: Duration,
        options: Option<UploadOptions>,
    ) -> Result<String, StorageError>;

    /// Delete one object. Returns `false` on any failure.
    async fn delete_file(&self, key: &str) -> bool;

    /// Delete many objects; never fails as a whole.
    async fn delete_files(&self, keys: &[String]) -> BatchOperationResult;

    /// Copy `src` to `dst`.
    async fn copy_file(
        &self,
        src: &str,
        dst: &str,
        options: Option<UploadOptions>,
    ) -> Result<UploadResult, StorageError>;

    /// Copy `src` to `dst`, then delete `src`.
    ///
    /// Not atomic: if the process stops between the two steps, or the source
    /// delete fails, the object exists under both keys. A failed source delete
    /// is reported as `success = false`; the source is never deleted when the
    /// copy fails.
    async fn move_file(
        &self,
        src: &str,
        dst: &str,
        options: Option<UploadOptions>,
    ) -> Result<UploadResult, StorageError>;

    /// List one page of objects.
    async fn list_files(&self, options: ListOptions) -> Result<ListResult, StorageError>;

    /// Bucket usage. Computed from a bounded listing when the provider has no
    /// aggregate API; check [`StorageStats::is_approximate`].
    async fn get_storage_stats(&self) -> Result<StorageStats, StorageError>;

    /// Read-only connectivity check.
    async fn test_connection(&self) -> bool;

    /// Delete temp-namespace objects last modified before `now - older_than`
    /// (default [`DEFAULT_CLEANUP_AGE`]).
    async fn cleanup(&self, older_than: Option<Duration>) -> BatchOperationResult;
}
