//! Storage service implementation using Apache OpenDAL.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt, stream};
use opendal::layers::RetryLayer;
use opendal::{Capability, Entry, Lister, Metadata, Operator, services};
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};
use url::Url;

use super::batch::{BatchCoordinator, ChunkDeleter, DeleteConfirmation};
use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;
use super::key::{namespace, validate_key};
use super::service::{
    ByteStream, DEFAULT_CLEANUP_AGE, DEFAULT_URL_EXPIRY, StorageService,
};
use super::types::{
    BatchOperationResult, FileInfo, ListOptions, ListResult, StorageStats, UploadOptions,
    UploadResult,
};

const ROOT: &str = "/";

/// Existence checks in flight after a failed batch delete.
const RECHECK_CONCURRENCY: usize = 16;

/// Apply upload options to an OpenDAL write or writer future, skipping the
/// ones the provider cannot honour.
macro_rules! with_write_options {
    ($fut:expr, $cap:expr, $options:expr, $provider:expr) => {{
        let mut fut = $fut;
        let cap: &Capability = $cap;
        let options: &UploadOptions = $options;
        if let Some(value) = options.content_type.as_deref() {
            if cap.write_with_content_type {
                fut = fut.content_type(value);
            } else {
                debug!(option = "content_type", "Provider ignores write option");
            }
        }
        if let Some(value) = options.cache_control.as_deref() {
            if cap.write_with_cache_control {
                fut = fut.cache_control(value);
            } else {
                debug!(option = "cache_control", "Provider ignores write option");
            }
        }
        if let Some(value) = options.content_disposition.as_deref() {
            if cap.write_with_content_disposition {
                fut = fut.content_disposition(value);
            } else {
                debug!(option = "content_disposition", "Provider ignores write option");
            }
        }
        let user_metadata = options.user_metadata();
        if !user_metadata.is_empty() {
            if cap.write_with_user_metadata {
                fut = fut.user_metadata(user_metadata);
            } else {
                debug!(option = "user_metadata", "Provider ignores write option");
            }
        }
        if let Some(extra) = &options.extra {
            if extra.provider() != $provider {
                warn!(
                    extra = extra.provider(),
                    provider = $provider,
                    "Ignoring write extension for a different provider"
                );
            } else if extra.if_not_exists() {
                fut = fut.if_not_exists(true);
            }
        }
        fut
    }};
}

/// [`StorageService`] backed by an OpenDAL operator.
///
/// The operator is created lazily by the first call (or by
/// [`initialize`](StorageService::initialize)); concurrent first callers
/// share a single initialization.
pub struct CloudStorageAdapter {
    config: StorageConfig,
    public_base: Option<Url>,
    operator: OnceCell<Operator>,
    coordinator: BatchCoordinator,
}

impl CloudStorageAdapter {
    /// Create an adapter from configuration. No provider call is made.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        config.validate()?;
        let coordinator = BatchCoordinator::from_config(&config);
        Ok(Self {
            public_base: config.public_base_url()?,
            config,
            operator: OnceCell::new(),
            coordinator,
        })
    }

    /// Wrap an operator that is already built. The connectivity check is
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_operator(config: StorageConfig, operator: Operator) -> Result<Self, StorageError> {
        config.validate()?;
        let coordinator = BatchCoordinator::from_config(&config);
        Ok(Self {
            public_base: config.public_base_url()?,
            config,
            operator: OnceCell::new_with(Some(operator)),
            coordinator,
        })
    }

    /// Build an OpenDAL operator for the configured provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the configuration.
    pub fn build_operator(config: &StorageConfig) -> Result<Operator, StorageError> {
        match &config.provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                access_key_secret,
                region,
            } => {
                let mut builder = services::S3::default()
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(access_key_secret)
                    .region(if region.is_empty() { "auto" } else { region })
                    .disable_config_load()
                    .disable_ec2_metadata();
                if !endpoint.is_empty() {
                    builder = builder.endpoint(&config.with_scheme(endpoint));
                }
                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .layer(RetryLayer::new().with_max_times(3))
                    .finish())
            }
            StorageProvider::Oss {
                endpoint,
                bucket,
                access_key_id,
                access_key_secret,
            } => {
                let builder = services::Oss::default()
                    .endpoint(&config.with_scheme(endpoint))
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .access_key_secret(access_key_secret);
                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .layer(RetryLayer::new().with_max_times(3))
                    .finish())
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );
                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish())
            }
            StorageProvider::Memory => Ok(Operator::new(services::Memory::default())
                .map_err(|e| StorageError::configuration(e.to_string()))?
                .finish()),
        }
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }

    /// Get the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        self.config.provider.bucket()
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    async fn operator(&self) -> Result<&Operator, StorageError> {
        self.operator
            .get_or_try_init(|| async {
                let operator = Self::build_operator(&self.config)
                    .map_err(|e| StorageError::initialization(e.to_string()))?;
                self.timed("check", async { operator.check().await.map_err(StorageError::from) })
                    .await
                    .map_err(|e| StorageError::initialization(e.to_string()))?;
                info!(
                    provider = self.provider_name(),
                    bucket = self.bucket(),
                    "Storage provider initialized"
                );
                Ok(operator)
            })
            .await
    }

    async fn timed<T, F>(&self, operation: &'static str, fut: F) -> Result<T, StorageError>
    where
        F: Future<Output = Result<T, StorageError>>,
    {
        let after = self.config.operation_timeout;
        tokio::time::timeout(after, fut)
            .await
            .map_err(|_| StorageError::Timeout { operation, after })?
    }

    /// Deterministic unsigned URL under the custom domain, if one is set.
    fn public_url(&self, key: &str) -> Option<String> {
        let mut url = self.public_base.clone()?;
        // The base was checked to accept path segments when the config was
        // validated.
        url.path_segments_mut()
            .ok()?
            .pop_if_empty()
            .extend(key.split('/'));
        Some(url.to_string())
    }

    async fn stat(&self, operator: &Operator, key: &str) -> Result<Metadata, StorageError> {
        self.timed("stat", async {
            operator
                .stat(key)
                .await
                .map_err(|e| StorageError::for_key(e, key))
        })
        .await
    }

    async fn write_bytes(
        &self,
        operator: &Operator,
        key: &str,
        data: Bytes,
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        let capability = operator.info().full_capability();
        let write = with_write_options!(
            operator.write_with(key, data),
            &capability,
            options,
            self.provider_name()
        );
        self.timed("write", async {
            write.await.map(|_| ()).map_err(StorageError::from)
        })
        .await
    }

    async fn write_stream(
        &self,
        operator: &Operator,
        key: &str,
        mut stream: ByteStream,
        options: &UploadOptions,
    ) -> Result<(), StorageError> {
        let capability = operator.info().full_capability();
        let open = with_write_options!(
            operator.writer_with(key),
            &capability,
            options,
            self.provider_name()
        );
        let mut writer = self
            .timed("open_writer", async { open.await.map_err(StorageError::from) })
            .await?;

        while let Some(chunk) = stream.next().await {
            let written = match chunk {
                Ok(chunk) => {
                    self.timed("write_chunk", async {
                        writer.write(chunk).await.map_err(StorageError::from)
                    })
                    .await
                }
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                if let Err(abort) = writer.abort().await {
                    warn!(key, error = %abort, "Failed to abort partial upload");
                }
                return Err(e);
            }
        }

        self.timed("close_writer", async {
            writer.close().await.map(|_| ()).map_err(StorageError::from)
        })
        .await
    }

    /// Read `src` and write it to `dst` with `options`.
    async fn copy_by_rewrite(
        &self,
        operator: &Operator,
        src: &str,
        dst: &str,
        options: Option<UploadOptions>,
    ) -> Result<u64, StorageError> {
        let options = match options {
            Some(options) => options,
            None => {
                let meta = self.stat(operator, src).await?;
                UploadOptions {
                    content_type: meta.content_type().map(String::from),
                    metadata: meta.user_metadata().cloned().unwrap_or_default(),
                    ..UploadOptions::default()
                }
            }
        };
        let data = self
            .timed("read", async {
                operator
                    .read(src)
                    .await
                    .map_err(|e| StorageError::for_key(e, src))
            })
            .await?
            .to_bytes();
        let size = data.len() as u64;
        self.write_bytes(operator, dst, data, &options).await?;
        Ok(size)
    }

    async fn try_copy(
        &self,
        src: &str,
        dst: &str,
        options: Option<UploadOptions>,
    ) -> Result<UploadResult, StorageError> {
        let operator = self.operator().await?;
        let native = options.is_none() && operator.info().full_capability().copy;

        let mut result = if native {
            self.timed("copy", async {
                operator
                    .copy(src, dst)
                    .await
                    .map_err(|e| StorageError::for_key(e, src))
            })
            .await?;
            match self.stat(operator, dst).await {
                Ok(meta) => {
                    let mut result = UploadResult::succeeded(dst, Some(meta.content_length()));
                    result.etag = meta.etag().map(String::from);
                    result
                }
                Err(_) => UploadResult::succeeded(dst, None),
            }
        } else {
            let size = self.copy_by_rewrite(operator, src, dst, options).await?;
            UploadResult::succeeded(dst, Some(size))
        };
        result.url = self.public_url(dst);
        Ok(result)
    }

    /// Metadata of a listed object. Some providers list without size or
    /// modification time; those entries are completed with a `stat`.
    async fn entry_info(&self, operator: &Operator, path: &str, listed: &Metadata) -> FileInfo {
        if listed.last_modified().is_some() && listed.content_length() > 0 {
            return file_info(path, listed);
        }
        match self.stat(operator, path).await {
            Ok(meta) => file_info(path, &meta),
            Err(e) => {
                debug!(key = path, error = %e, "Using listed metadata");
                file_info(path, listed)
            }
        }
    }

    async fn open_lister(
        &self,
        operator: &Operator,
        path: &str,
        recursive: bool,
        start_after: Option<&str>,
    ) -> Result<Lister, StorageError> {
        let mut open = operator.lister_with(path).recursive(recursive);
        if let Some(key) = start_after {
            open = open.start_after(key);
        }
        self.timed("list", async { open.await.map_err(StorageError::from) })
            .await
    }

    async fn next_entry(&self, lister: &mut Lister) -> Result<Option<Entry>, StorageError> {
        self.timed("list_next", async {
            lister.try_next().await.map_err(StorageError::from)
        })
        .await
    }

    /// Every object under `prefix`, in a single listing pass.
    async fn list_all(&self, prefix: &str) -> Result<Vec<FileInfo>, StorageError> {
        let operator = self.operator().await?;
        let mut lister = self
            .open_lister(operator, list_root(prefix), true, None)
            .await?;

        let mut files = Vec::new();
        while let Some(entry) = self.next_entry(&mut lister).await? {
            let path = entry.path().trim_start_matches('/');
            if !path.starts_with(prefix) || entry.metadata().is_dir() || path.ends_with('/') {
                continue;
            }
            files.push(self.entry_info(operator, path, entry.metadata()).await);
        }
        Ok(files)
    }

    /// Delete temp-namespace objects last modified strictly before `cutoff`.
    ///
    /// If the namespace cannot be listed nothing is deleted and the result
    /// carries the error.
    pub async fn cleanup_before(&self, cutoff: DateTime<Utc>) -> BatchOperationResult {
        let prefix = namespace(&self.config.temp_prefix);

        let files = match self.list_all(&prefix).await {
            Ok(files) => files,
            Err(e) => {
                error!(prefix, error = %e, "Temp cleanup could not list objects");
                return BatchOperationResult::aborted(format!(
                    "could not list '{prefix}': {e}"
                ));
            }
        };

        let expired = expired_keys(&files, cutoff);
        info!(
            prefix,
            scanned = files.len(),
            expired = expired.len(),
            %cutoff,
            "Cleaning up temp objects"
        );
        self.delete_files(&expired).await
    }

    /// Settle the keys of a failed batch call one by one. Keys that no
    /// longer exist were deleted; the rest keep the batch error.
    async fn confirm_individually(
        &self,
        operator: &Operator,
        keys: &[&str],
        reason: &str,
    ) -> Vec<DeleteConfirmation> {
        let checks: Vec<_> = keys
            .iter()
            .copied()
            .map(|key| async move {
                match self.stat(operator, key).await {
                    Err(e) if e.is_not_found() => DeleteConfirmation::deleted(key),
                    Ok(_) => DeleteConfirmation::rejected(key, reason),
                    Err(e) => DeleteConfirmation::rejected(key, format!("{reason}; {e}")),
                }
            })
            .collect();
        stream::iter(checks)
            .buffered(RECHECK_CONCURRENCY)
            .collect()
            .await
    }
}

/// Keys of objects last modified strictly before `cutoff`.
///
/// Objects without a modification time are kept.
#[must_use]
pub fn expired_keys(files: &[FileInfo], cutoff: DateTime<Utc>) -> Vec<String> {
    files
        .iter()
        .filter(|f| f.last_modified.is_some_and(|t| t < cutoff))
        .map(|f| f.key.clone())
        .collect()
}

fn file_info(key: &str, meta: &Metadata) -> FileInfo {
    FileInfo {
        key: key.to_string(),
        size: meta.content_length(),
        content_type: meta.content_type().map(String::from),
        etag: meta.etag().map(String::from),
        last_modified: meta
            .last_modified()
            .and_then(|t| DateTime::from_timestamp_millis(t.into_inner().as_millisecond())),
        metadata: meta.user_metadata().cloned().unwrap_or_default(),
    }
}

/// Directory to list so that every key starting with `prefix` is reached.
fn list_root(prefix: &str) -> &str {
    match prefix.rfind('/') {
        Some(i) => &prefix[..=i],
        None => ROOT,
    }
}

#[async_trait]
impl ChunkDeleter for CloudStorageAdapter {
    async fn delete_chunk(&self, keys: &[String]) -> Result<Vec<DeleteConfirmation>, StorageError> {
        let operator = self.operator().await?;

        let mut confirmations = Vec::with_capacity(keys.len());
        let mut accepted = Vec::with_capacity(keys.len());
        for key in keys {
            match validate_key(key) {
                Ok(()) => accepted.push(key.as_str()),
                Err(e) => confirmations.push(DeleteConfirmation::rejected(key.clone(), e.to_string())),
            }
        }

        if accepted.is_empty() {
            return Ok(confirmations);
        }
        match operator.delete_iter(accepted.clone()).await {
            Ok(()) => confirmations.extend(accepted.into_iter().map(DeleteConfirmation::deleted)),
            Err(e) => {
                let reason = StorageError::from(e).to_string();
                warn!(
                    keys = accepted.len(),
                    error = %reason,
                    "Batch delete failed; checking keys individually"
                );
                confirmations.extend(self.confirm_individually(operator, &accepted, &reason).await);
            }
        }
        Ok(confirmations)
    }
}

#[async_trait]
impl StorageService for CloudStorageAdapter {
    async fn initialize(&self) -> Result<(), StorageError> {
        self.operator().await.map(|_| ())
    }

    async fn upload_file(
        &self,
        data: Bytes,
        key: &str,
        options: Option<UploadOptions>,
    ) -> Result<UploadResult, StorageError> {
        validate_key(key)?;
        let operator = self.operator().await?;
        let options = options.unwrap_or_default();
        let size = data.len() as u64;

        match self.write_bytes(operator, key, data, &options).await {
            Ok(()) => {
                debug!(key, size, "File uploaded");
                let mut result = UploadResult::succeeded(key, Some(size));
                result.url = self.public_url(key);
                Ok(result)
            }
            Err(e) => {
                warn!(key, error = %e, "Upload failed");
                Ok(UploadResult::failed(key, e.to_string()))
            }
        }
    }

    async fn upload_stream(
        &self,
        stream: ByteStream,
        key: &str,
        options: Option<UploadOptions>,
    ) -> Result<UploadResult, StorageError> {
        validate_key(key)?;
        let operator = self.operator().await?;
        let options = options.unwrap_or_default();

        match self.write_stream(operator, key, stream, &options).await {
            Ok(()) => {
                debug!(key, "Stream uploaded");
                let mut result = UploadResult::succeeded(key, None);
                result.url = self.public_url(key);
                Ok(result)
            }
            Err(e) => {
                warn!(key, error = %e, "Stream upload failed");
                Ok(UploadResult::failed(key, e.to_string()))
            }
        }
    }

    async fn download_file(&self, key: &str) -> Result<Bytes, StorageError> {
        validate_key(key)?;
        let operator = self.operator().await?;
        let buffer = self
            .timed("read", async {
                operator
                    .read(key)
                    .await
                    .map_err(|e| StorageError::for_key(e, key))
            })
            .await?;
        Ok(buffer.to_bytes())
    }

    async fn get_file_stream(&self, key: &str) -> Result<ByteStream, StorageError> {
        validate_key(key)?;
        let operator = self.operator().await?;
        // Readers open lazily, so stat first to surface a missing key here.
        self.stat(operator, key).await?;

        let stream = self
            .timed("open_reader", async {
                let reader = operator
                    .reader(key)
                    .await
                    .map_err(|e| StorageError::for_key(e, key))?;
                reader
                    .into_bytes_stream(..)
                    .await
                    .map_err(|e| StorageError::for_key(e, key))
            })
            .await?;

        Ok(stream
            .map(|chunk| chunk.map_err(|e| StorageError::operation(e.to_string())))
            .boxed())
    }

    async fn get_file_info(&self, key: &str) -> Result<FileInfo, StorageError> {
        validate_key(key)?;
        let operator = self.operator().await?;
        let meta = self.stat(operator, key).await?;
        Ok(file_info(key, &meta))
    }

    async fn file_exists(&self, key: &str) -> bool {
        if validate_key(key).is_err() {
            return false;
        }
        let Ok(operator) = self.operator().await else {
            return false;
        };
        match self.stat(operator, key).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                debug!(key, error = %e, "Existence check failed");
                false
            }
        }
    }

    async fn get_file_url(
        &self,
        key: &str,
        expires_in: Option<Duration>,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        if let Some(url) = self.public_url(key) {
            return Ok(url);
        }

        let expires_in = expires_in.unwrap_or(DEFAULT_URL_EXPIRY);
        let operator = self.operator().await?;
        if !operator.info().full_capability().presign_read {
            return Err(StorageError::PresignNotSupported);
        }
        let presigned = self
            .timed("presign_read", async {
                operator
                    .presign_read(key, expires_in)
                    .await
                    .map_err(StorageError::from)
            })
            .await?;
        Ok(presigned.uri().to_string())
    }

    async fn get_signed_upload_url(
        &self,
        key: &str,
        expires_in: Duration,
        options: Option<UploadOptions>,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        let operator = self.operator().await?;
        if !operator.info().full_capability().presign_write {
            return Err(StorageError::PresignNotSupported);
        }

        let mut presign = operator.presign_write_with(key, expires_in);
        if let Some(content_type) = options.as_ref().and_then(|o| o.content_type.as_deref()) {
            presign = presign.content_type(content_type);
        }
        let presigned = self
            .timed("presign_write", async { presign.await.map_err(StorageError::from) })
            .await?;
        Ok(presigned.uri().to_string())
    }

    async fn delete_file(&self, key: &str) -> bool {
        if let Err(e) = validate_key(key) {
            warn!(key, error = %e, "Refusing to delete invalid key");
            return false;
        }
        let operator = match self.operator().await {
            Ok(operator) => operator,
            Err(e) => {
                warn!(key, error = %e, "Delete failed");
                return false;
            }
        };
        match self
            .timed("delete", async {
                operator.delete(key).await.map_err(StorageError::from)
            })
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Delete failed");
                false
            }
        }
    }

    async fn delete_files(&self, keys: &[String]) -> BatchOperationResult {
        self.coordinator.delete_all(self, keys).await
    }

    async fn copy_file(
        &self,
        src: &str,
        dst: &str,
        options: Option<UploadOptions>,
    ) -> Result<UploadResult, StorageError> {
        validate_key(src)?;
        validate_key(dst)?;

        match self.try_copy(src, dst, options).await {
            Ok(result) => {
                debug!(src, dst, "File copied");
                Ok(result)
            }
            Err(e) => {
                warn!(src, dst, error = %e, "Copy failed");
                Ok(UploadResult::failed(dst, e.to_string()))
            }
        }
    }

    async fn move_file(
        &self,
        src: &str,
        dst: &str,
        options: Option<UploadOptions>,
    ) -> Result<UploadResult, StorageError> {
        validate_key(src)?;
        validate_key(dst)?;
        if src == dst {
            return self
                .get_file_info(src)
                .await
                .map(|info| UploadResult::succeeded(dst, Some(info.size)))
                .or_else(|e| Ok(UploadResult::failed(dst, e.to_string())));
        }

        let copied = self.copy_file(src, dst, options).await?;
        if !copied.success {
            return Ok(copied);
        }
        if self.delete_file(src).await {
            return Ok(copied);
        }

        warn!(src, dst, "Move left the object under both keys");
        Ok(UploadResult {
            success: false,
            error: Some(format!(
                "copied to '{dst}' but could not delete source '{src}'; object exists under both keys"
            )),
            ..copied
        })
    }

    async fn list_files(&self, options: ListOptions) -> Result<ListResult, StorageError> {
        let prefix = options.prefix.clone().unwrap_or_default();
        if !prefix.is_empty() {
            validate_key(&prefix)?;
        }
        let delimited = match options.delimiter.as_deref() {
            None => false,
            Some("/") => true,
            Some(other) => {
                return Err(StorageError::configuration(format!(
                    "unsupported delimiter '{other}'"
                )));
            }
        };
        let max_keys = if options.max_keys == 0 {
            ListOptions::DEFAULT_MAX_KEYS
        } else {
            options.max_keys
        };

        let operator = self.operator().await?;
        let token = options.continuation_token.as_deref();
        // Providers that can resume after a key also list in key order, so
        // the page can stop early.
        let ordered = operator.info().full_capability().list_with_start_after;
        let mut lister = self
            .open_lister(
                operator,
                list_root(&prefix),
                !delimited,
                token.filter(|_| ordered),
            )
            .await?;

        // (path, is_prefix, listed metadata)
        let mut items: Vec<(String, bool, Metadata)> = Vec::new();
        while let Some(entry) = self.next_entry(&mut lister).await? {
            let path = entry.path().trim_start_matches('/');
            if !path.starts_with(prefix.as_str()) {
                if ordered && path > prefix.as_str() {
                    break;
                }
                continue;
            }
            if path == prefix || token.is_some_and(|t| path <= t) {
                continue;
            }
            let is_prefix = entry.metadata().is_dir() || path.ends_with('/');
            if is_prefix && !delimited {
                continue;
            }
            items.push((path.to_string(), is_prefix, entry.metadata().clone()));
            if ordered && items.len() > max_keys {
                break;
            }
        }
        if !ordered {
            items.sort_by(|a, b| a.0.cmp(&b.0));
        }

        let is_truncated = items.len() > max_keys;
        items.truncate(max_keys);
        let continuation_token = if is_truncated {
            items.last().map(|(path, ..)| path.clone())
        } else {
            None
        };

        let mut files = Vec::new();
        let mut common_prefixes = Vec::new();
        for (path, is_prefix, listed) in items {
            if is_prefix {
                common_prefixes.push(path);
            } else {
                files.push(self.entry_info(operator, &path, &listed).await);
            }
        }

        Ok(ListResult {
            files,
            is_truncated,
            continuation_token,
            common_prefixes,
        })
    }

    async fn get_storage_stats(&self) -> Result<StorageStats, StorageError> {
        let operator = self.operator().await?;
        let limit = self.config.stats_sample_limit;

        let mut lister = self.open_lister(operator, ROOT, true, None).await?;
        let mut total_files = 0u64;
        let mut total_size = 0u64;
        let mut is_approximate = false;
        while let Some(entry) = self.next_entry(&mut lister).await? {
            if entry.metadata().is_dir() || entry.path().ends_with('/') {
                continue;
            }
            if total_files == limit as u64 {
                is_approximate = true;
                break;
            }
            total_files += 1;
            total_size += match entry.metadata().content_length() {
                0 => self
                    .stat(operator, entry.path())
                    .await
                    .map_or(0, |meta| meta.content_length()),
                n => n,
            };
        }

        if is_approximate {
            warn!(
                limit,
                "Storage stats hit the sample limit; totals are a lower bound"
            );
        }

        Ok(StorageStats {
            total_files,
            total_size,
            used_space: total_size,
            last_updated: Utc::now(),
            is_approximate,
        })
    }

    async fn test_connection(&self) -> bool {
        let operator = match self.operator().await {
            Ok(operator) => operator,
            Err(e) => {
                warn!(error = %e, "Storage connection test failed");
                return false;
            }
        };
        match self
            .timed("check", async { operator.check().await.map_err(StorageError::from) })
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Storage connection test failed");
                false
            }
        }
    }

    async fn cleanup(&self, older_than: Option<Duration>) -> BatchOperationResult {
        let older_than = older_than.unwrap_or(DEFAULT_CLEANUP_AGE);
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.cleanup_before(cutoff).await
    }
}
