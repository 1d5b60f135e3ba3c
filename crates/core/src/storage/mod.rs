//! Provider-agnostic object storage using Apache OpenDAL.
//!
//! Supported providers:
//! - S3-compatible: AWS S3, Cloudflare R2, MinIO
//! - Aliyun OSS
//! - Local filesystem (development only)
//! - Memory (tests only)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              StorageService (trait, dyn-compatible)              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ CloudStorageAdapter        │ BatchCoordinator                   │
//! │  key validation, timeouts  │  chunked deletes, per-key results  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                      Apache OpenDAL Operator                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod adapter;
mod batch;
mod config;
mod error;
mod key;
mod service;
mod types;

pub use adapter::{CloudStorageAdapter, expired_keys};
pub use batch::{BatchCoordinator, ChunkDeleter, DeleteConfirmation};
pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use key::{MAX_KEY_LEN, namespace, sanitize_filename, temp_key, validate_key};
pub use service::{ByteStream, DEFAULT_CLEANUP_AGE, DEFAULT_URL_EXPIRY, StorageService};
pub use types::{
    BatchItemResult, BatchOperationResult, FileInfo, ListOptions, ListResult, ProviderExtra,
    StorageStats, UploadOptions, UploadResult,
};
