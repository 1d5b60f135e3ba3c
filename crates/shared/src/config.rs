//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Object storage configuration.
    pub storage: StorageSettings,
    /// Retention job configuration.
    #[serde(default)]
    pub retention: RetentionSettings,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Which object storage backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// S3-compatible storage (AWS S3, Cloudflare R2, MinIO).
    S3,
    /// Aliyun Object Storage Service.
    Oss,
    /// Local filesystem (development only).
    LocalFs,
    /// In-process memory (tests and local experiments).
    Memory,
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Storage backend.
    pub provider: ProviderKind,
    /// Access key ID.
    #[serde(default)]
    pub access_key_id: String,
    /// Access key secret.
    #[serde(default)]
    pub access_key_secret: String,
    /// Bucket name.
    #[serde(default)]
    pub bucket: String,
    /// Region (S3 only; OSS encodes it in the endpoint).
    #[serde(default)]
    pub region: String,
    /// Endpoint host or URL.
    #[serde(default)]
    pub endpoint: String,
    /// Use HTTPS when the endpoint has no scheme.
    #[serde(default = "default_secure")]
    pub secure: bool,
    /// Public domain serving the bucket; disables URL signing for reads.
    #[serde(default)]
    pub custom_domain: Option<String>,
    /// Root directory for the local filesystem provider.
    #[serde(default)]
    pub root: Option<String>,
    /// Key prefix of the temporary upload namespace.
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,
    /// Maximum keys per provider batch-delete call.
    #[serde(default = "default_batch_chunk_size")]
    pub batch_chunk_size: usize,
    /// Timeout applied to each provider call, in seconds.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
    /// Maximum objects listed when computing storage stats.
    #[serde(default = "default_stats_sample_limit")]
    pub stats_sample_limit: usize,
}

fn default_secure() -> bool {
    true
}

fn default_temp_prefix() -> String {
    "temp".to_string()
}

fn default_batch_chunk_size() -> usize {
    1000
}

fn default_operation_timeout() -> u64 {
    30
}

fn default_stats_sample_limit() -> usize {
    10_000
}

/// Calendar trigger for a recurring job. Times are UTC.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleSettings {
    /// Fires once a week.
    Weekly {
        /// Day of week, e.g. `sun` or `sunday`.
        weekday: String,
        /// Hour of day (0-23).
        #[serde(default)]
        hour: u32,
        /// Minute of hour (0-59).
        #[serde(default)]
        minute: u32,
    },
    /// Fires once a month.
    Monthly {
        /// Day of month (1-28).
        day: u32,
        /// Hour of day (0-23).
        #[serde(default)]
        hour: u32,
        /// Minute of hour (0-59).
        #[serde(default)]
        minute: u32,
    },
}

/// Retention job configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetentionSettings {
    /// Days a temp upload may stay unclaimed.
    #[serde(default = "default_temp_retention_days")]
    pub temp_retention_days: u32,
    /// Days a soft-deleted record is kept before purge.
    #[serde(default = "default_soft_delete_retention_days")]
    pub soft_delete_retention_days: u32,
    /// Records fetched from the store per page of a run.
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Trigger of the temp-cleanup job.
    #[serde(default = "default_temp_schedule")]
    pub temp_schedule: ScheduleSettings,
    /// Trigger of the soft-delete purge job.
    #[serde(default = "default_purge_schedule")]
    pub purge_schedule: ScheduleSettings,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            temp_retention_days: default_temp_retention_days(),
            soft_delete_retention_days: default_soft_delete_retention_days(),
            page_size: default_page_size(),
            temp_schedule: default_temp_schedule(),
            purge_schedule: default_purge_schedule(),
        }
    }
}

fn default_temp_retention_days() -> u32 {
    7
}

fn default_soft_delete_retention_days() -> u32 {
    30
}

fn default_page_size() -> u64 {
    1000
}

fn default_temp_schedule() -> ScheduleSettings {
    ScheduleSettings::Weekly {
        weekday: "sun".to_string(),
        hour: 2,
        minute: 0,
    }
}

fn default_purge_schedule() -> ScheduleSettings {
    ScheduleSettings::Monthly {
        day: 1,
        hour: 3,
        minute: 0,
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("AUTODOCS")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_with(vars: &[(&str, Option<&str>)]) -> Result<AppConfig, config::ConfigError> {
        let mut all: Vec<(&str, Option<&str>)> = vec![
            ("RUN_MODE", Some("test-nonexistent")),
            ("AUTODOCS__DATABASE__URL", Some("postgres://localhost/autodocs_test")),
            ("AUTODOCS__STORAGE__PROVIDER", Some("memory")),
        ];
        all.extend_from_slice(vars);
        temp_env::with_vars(all, AppConfig::load)
    }

    #[test]
    fn test_load_applies_defaults() {
        let config = load_with(&[]).expect("config should load");

        assert_eq!(config.database.url, "postgres://localhost/autodocs_test");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.storage.provider, ProviderKind::Memory);
        assert!(config.storage.secure);
        assert_eq!(config.storage.temp_prefix, "temp");
        assert_eq!(config.storage.batch_chunk_size, 1000);
        assert_eq!(config.storage.operation_timeout_secs, 30);
        assert_eq!(config.retention.temp_retention_days, 7);
        assert_eq!(config.retention.soft_delete_retention_days, 30);
        assert_eq!(config.retention.temp_schedule, default_temp_schedule());
        assert_eq!(config.retention.purge_schedule, default_purge_schedule());
    }

    #[test]
    fn test_env_overrides_nested_values() {
        let config = load_with(&[
            ("AUTODOCS__STORAGE__BATCH_CHUNK_SIZE", Some("250")),
            ("AUTODOCS__STORAGE__SECURE", Some("false")),
            ("AUTODOCS__STORAGE__CUSTOM_DOMAIN", Some("cdn.example.com")),
            ("AUTODOCS__RETENTION__TEMP_RETENTION_DAYS", Some("3")),
        ])
        .expect("config should load");

        assert_eq!(config.storage.batch_chunk_size, 250);
        assert!(!config.storage.secure);
        assert_eq!(
            config.storage.custom_domain.as_deref(),
            Some("cdn.example.com")
        );
        assert_eq!(config.retention.temp_retention_days, 3);
    }

    #[test]
    fn test_missing_database_url_fails() {
        let result = temp_env::with_vars(
            [
                ("RUN_MODE", Some("test-nonexistent")),
                ("AUTODOCS__DATABASE__URL", None),
                ("AUTODOCS__STORAGE__PROVIDER", Some("memory")),
            ],
            AppConfig::load,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_schedule_settings_deserialize() {
        let weekly: ScheduleSettings =
            serde_json::from_str(r#"{"type":"weekly","weekday":"sat","hour":4}"#)
                .expect("valid weekly schedule");
        assert_eq!(
            weekly,
            ScheduleSettings::Weekly {
                weekday: "sat".to_string(),
                hour: 4,
                minute: 0,
            }
        );

        let monthly: ScheduleSettings =
            serde_json::from_str(r#"{"type":"monthly","day":15,"hour":1,"minute":30}"#)
                .expect("valid monthly schedule");
        assert_eq!(
            monthly,
            ScheduleSettings::Monthly {
                day: 15,
                hour: 1,
                minute: 30,
            }
        );
    }
}
