//! Storage configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use autodocs_shared::{ProviderKind, StorageSettings};

use super::error::StorageError;

/// Storage provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProvider {
    /// S3-compatible storage: AWS S3, Cloudflare R2, MinIO
    S3 {
        /// Endpoint host or URL.
        endpoint: String,
        /// Bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        access_key_secret: String,
        /// Region.
        region: String,
    },
    /// Aliyun Object Storage Service
    Oss {
        /// Endpoint host or URL, e.g. `oss-cn-hangzhou.aliyuncs.com`.
        endpoint: String,
        /// Bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Access key secret.
        access_key_secret: String,
    },
    /// Local filesystem (development only)
    LocalFs {
        /// Root directory path.
        root: PathBuf,
    },
    /// In-process memory (tests only)
    Memory,
}

impl StorageProvider {
    /// Create S3-compatible provider.
    #[must_use]
    pub fn s3(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self::S3 {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            region: region.into(),
        }
    }

    /// Create Aliyun OSS provider.
    #[must_use]
    pub fn oss(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
    ) -> Self {
        Self::Oss {
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
        }
    }

    /// Create local filesystem provider (development only).
    #[must_use]
    pub fn local_fs(root: impl Into<PathBuf>) -> Self {
        Self::LocalFs { root: root.into() }
    }

    /// Get the provider name for records and logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::S3 { .. } => "s3",
            Self::Oss { .. } => "oss",
            Self::LocalFs { .. } => "local",
            Self::Memory => "memory",
        }
    }

    /// Get the bucket name.
    #[must_use]
    pub fn bucket(&self) -> &str {
        match self {
            Self::S3 { bucket, .. } | Self::Oss { bucket, .. } => bucket,
            Self::LocalFs { root } => root.to_str().unwrap_or("local"),
            Self::Memory => "memory",
        }
    }
}

/// Storage service configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Storage provider configuration.
    pub provider: StorageProvider,
    /// Use HTTPS for endpoints and custom domains given without a scheme.
    pub secure: bool,
    /// Public domain serving the bucket. When set, read URLs are unsigned.
    pub custom_domain: Option<String>,
    /// Key prefix of the temporary upload namespace.
    pub temp_prefix: String,
    /// Maximum keys per provider batch-delete call.
    pub batch_chunk_size: usize,
    /// Chunks of one batch delete issued concurrently (1 = sequential).
    pub max_concurrent_chunks: usize,
    /// Timeout applied to each provider call.
    pub operation_timeout: Duration,
    /// Maximum objects listed when computing storage stats.
    pub stats_sample_limit: usize,
}

impl StorageConfig {
    /// Default batch-delete limit, matching S3 `DeleteObjects`.
    pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 1000;
    /// Default per-call timeout: 30 seconds.
    pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default stats sample: 10k objects.
    pub const DEFAULT_STATS_SAMPLE_LIMIT: usize = 10_000;
    /// Default temp namespace.
    pub const DEFAULT_TEMP_PREFIX: &'static str = "temp";

    /// Create a new storage config with default settings.
    #[must_use]
    pub fn new(provider: StorageProvider) -> Self {
        Self {
            provider,
            secure: true,
            custom_domain: None,
            temp_prefix: Self::DEFAULT_TEMP_PREFIX.to_string(),
            batch_chunk_size: Self::DEFAULT_BATCH_CHUNK_SIZE,
            max_concurrent_chunks: 1,
            operation_timeout: Self::DEFAULT_OPERATION_TIMEOUT,
            stats_sample_limit: Self::DEFAULT_STATS_SAMPLE_LIMIT,
        }
    }

    /// Set the custom public domain.
    #[must_use]
    pub fn with_custom_domain(mut self, domain: impl Into<String>) -> Self {
        self.custom_domain = Some(domain.into());
        self
    }

    /// Set whether plain hosts get an `https` scheme.
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Set the temp namespace prefix.
    #[must_use]
    pub fn with_temp_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.temp_prefix = prefix.into();
        self
    }

    /// Set the batch-delete chunk size.
    #[must_use]
    pub fn with_batch_chunk_size(mut self, size: usize) -> Self {
        self.batch_chunk_size = size;
        self
    }

    /// Set how many chunks may be in flight at once.
    #[must_use]
    pub fn with_max_concurrent_chunks(mut self, n: usize) -> Self {
        self.max_concurrent_chunks = n;
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Set the stats sample limit.
    #[must_use]
    pub fn with_stats_sample_limit(mut self, limit: usize) -> Self {
        self.stats_sample_limit = limit;
        self
    }

    /// Check invariants that the provider cannot check for us.
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first invalid field.
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.batch_chunk_size == 0 {
            return Err(StorageError::configuration("batch_chunk_size must be > 0"));
        }
        if self.max_concurrent_chunks == 0 {
            return Err(StorageError::configuration(
                "max_concurrent_chunks must be > 0",
            ));
        }
        if self.operation_timeout.is_zero() {
            return Err(StorageError::configuration(
                "operation_timeout must be > 0",
            ));
        }
        if self.temp_prefix.trim_matches('/').is_empty() {
            return Err(StorageError::configuration("temp_prefix must not be empty"));
        }
        if let StorageProvider::S3 { bucket, .. } | StorageProvider::Oss { bucket, .. } =
            &self.provider
        {
            if bucket.is_empty() {
                return Err(StorageError::configuration("bucket must not be empty"));
            }
        }
        self.public_base_url()?;
        Ok(())
    }

    /// Parsed custom domain that object keys are appended to.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the domain is not a usable base URL.
    pub fn public_base_url(&self) -> Result<Option<Url>, StorageError> {
        let Some(domain) = self.custom_domain.as_deref() else {
            return Ok(None);
        };
        let url = Url::parse(&self.with_scheme(domain))
            .map_err(|e| StorageError::configuration(format!("invalid custom domain: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(StorageError::configuration(
                "custom domain cannot be a base URL",
            ));
        }
        Ok(Some(url))
    }

    /// Prefix an endpoint or domain with a scheme if it has none.
    #[must_use]
    pub fn with_scheme(&self, host: &str) -> String {
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else if self.secure {
            format!("https://{host}")
        } else {
            format!("http://{host}")
        }
    }
}

impl TryFrom<&StorageSettings> for StorageConfig {
    type Error = StorageError;

    fn try_from(settings: &StorageSettings) -> Result<Self, Self::Error> {
        let provider = match settings.provider {
            ProviderKind::S3 => StorageProvider::s3(
                settings.endpoint.clone(),
                settings.bucket.clone(),
                settings.access_key_id.clone(),
                settings.access_key_secret.clone(),
                settings.region.clone(),
            ),
            ProviderKind::Oss => StorageProvider::oss(
                settings.endpoint.clone(),
                settings.bucket.clone(),
                settings.access_key_id.clone(),
                settings.access_key_secret.clone(),
            ),
            ProviderKind::LocalFs => {
                let root = settings.root.clone().ok_or_else(|| {
                    StorageError::configuration("local_fs provider requires storage.root")
                })?;
                StorageProvider::local_fs(root)
            }
            ProviderKind::Memory => StorageProvider::Memory,
        };

        let mut config = Self::new(provider)
            .with_secure(settings.secure)
            .with_temp_prefix(settings.temp_prefix.clone())
            .with_batch_chunk_size(settings.batch_chunk_size)
            .with_operation_timeout(Duration::from_secs(settings.operation_timeout_secs))
            .with_stats_sample_limit(settings.stats_sample_limit);
        config.custom_domain = settings
            .custom_domain
            .clone()
            .filter(|d| !d.trim().is_empty());

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: ProviderKind) -> StorageSettings {
        StorageSettings {
            provider,
            access_key_id: "id".to_string(),
            access_key_secret: "secret".to_string(),
            bucket: "manuals".to_string(),
            region: "us-east-1".to_string(),
            endpoint: "minio.local:9000".to_string(),
            secure: false,
            custom_domain: Some("  ".to_string()),
            root: None,
            temp_prefix: "temp".to_string(),
            batch_chunk_size: 500,
            operation_timeout_secs: 5,
            stats_sample_limit: 100,
        }
    }

    #[test]
    fn test_storage_provider_s3() {
        let provider = StorageProvider::s3(
            "https://s3.amazonaws.com",
            "manuals",
            "access_key",
            "secret_key",
            "us-east-1",
        );
        assert_eq!(provider.name(), "s3");
        assert_eq!(provider.bucket(), "manuals");
    }

    #[test]
    fn test_storage_provider_oss() {
        let provider = StorageProvider::oss("oss-cn-hangzhou.aliyuncs.com", "manuals", "a", "b");
        assert_eq!(provider.name(), "oss");
        assert_eq!(provider.bucket(), "manuals");
    }

    #[test]
    fn test_storage_config_defaults() {
        let config = StorageConfig::new(StorageProvider::Memory);
        assert_eq!(config.batch_chunk_size, 1000);
        assert_eq!(config.max_concurrent_chunks, 1);
        assert_eq!(config.operation_timeout, Duration::from_secs(30));
        assert_eq!(config.temp_prefix, "temp");
        assert!(config.custom_domain.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_chunk_size() {
        let config = StorageConfig::new(StorageProvider::Memory).with_batch_chunk_size(0);
        assert!(matches!(
            config.validate(),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_custom_domain() {
        let config =
            StorageConfig::new(StorageProvider::Memory).with_custom_domain("cdn example.com");
        assert!(matches!(
            config.validate(),
            Err(StorageError::Configuration(_))
        ));

        let config = StorageConfig::new(StorageProvider::Memory)
            .with_custom_domain("cdn.autodocs.example/manuals");
        let base = config.public_base_url().expect("valid").expect("set");
        assert_eq!(base.as_str(), "https://cdn.autodocs.example/manuals");
    }

    #[test]
    fn test_with_scheme() {
        let secure = StorageConfig::new(StorageProvider::Memory);
        assert_eq!(secure.with_scheme("cdn.example.com"), "https://cdn.example.com");
        assert_eq!(secure.with_scheme("http://x.test"), "http://x.test");

        let plain = StorageConfig::new(StorageProvider::Memory).with_secure(false);
        assert_eq!(plain.with_scheme("minio:9000"), "http://minio:9000");
    }

    #[test]
    fn test_from_settings() {
        let config = StorageConfig::try_from(&settings(ProviderKind::S3)).expect("valid");
        assert_eq!(config.provider.name(), "s3");
        assert_eq!(config.batch_chunk_size, 500);
        assert_eq!(config.operation_timeout, Duration::from_secs(5));
        assert!(!config.secure);
        // blank domain is treated as unset
        assert!(config.custom_domain.is_none());
    }

    #[test]
    fn test_from_settings_local_fs_requires_root() {
        let result = StorageConfig::try_from(&settings(ProviderKind::LocalFs));
        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }
}
