//! Configuration loading and types for bucketfs.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: store behaviour, bucket-creation retries, the object-store
//! backend, and logging.

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::storage::aws::AwsClient;
use crate::storage::client::ObjectStoreClient;
use crate::storage::memory::MemoryClient;
use crate::store::StoreOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// File-store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Bucket-creation retry settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Object-store backend settings.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// File-store behaviour.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Bucket that non-rooted paths resolve against.
    #[serde(default = "default_bucket")]
    pub default_bucket: String,

    /// Upper bound on a single streamed write, in seconds (default 40 min).
    #[serde(default = "default_write_timeout")]
    pub write_timeout_seconds: u64,

    /// Concurrent object deletes during a directory delete.
    #[serde(default = "default_delete_concurrency")]
    pub delete_concurrency: usize,

    /// Entries requested per listing page.
    #[serde(default = "default_list_page_size")]
    pub list_page_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_bucket: default_bucket(),
            write_timeout_seconds: default_write_timeout(),
            delete_concurrency: default_delete_concurrency(),
            list_page_size: default_list_page_size(),
        }
    }
}

/// Retry policy for bucket-creation conflicts.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,

    /// Fixed sleep between attempts, in milliseconds.
    #[serde(default = "default_conflict_interval_ms")]
    pub conflict_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            conflict_retries: default_conflict_retries(),
            conflict_interval_ms: default_conflict_interval_ms(),
        }
    }
}

/// Object-store backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Backend type: `aws` or `memory`.
    #[serde(default = "default_backend_kind")]
    pub kind: String,

    /// AWS S3 (or S3-compatible) configuration.
    #[serde(default)]
    pub aws: Option<AwsBackendConfig>,

    /// Listing page size of the memory backend.
    #[serde(default = "default_list_page_size")]
    pub memory_page_size: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            aws: None,
            memory_page_size: default_list_page_size(),
        }
    }
}

/// AWS S3 client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AwsBackendConfig {
    /// AWS region; buckets are created here.
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3-compatible endpoint (e.g. MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: String,
    /// Force path-style URL addressing.
    #[serde(default)]
    pub use_path_style: bool,
    /// Explicit AWS access key (falls back to env/credential chain).
    #[serde(default)]
    pub access_key_id: String,
    /// Explicit AWS secret key (falls back to env/credential chain).
    #[serde(default)]
    pub secret_access_key: String,
}

impl Default for AwsBackendConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: String::new(),
            use_path_style: false,
            access_key_id: String::new(),
            secret_access_key: String::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Store options derived from the `store` and `retry` sections.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            conflict_retry: RetryPolicy::fixed(
                self.retry.conflict_retries,
                Duration::from_millis(self.retry.conflict_interval_ms),
            ),
            write_timeout: Duration::from_secs(self.store.write_timeout_seconds),
            delete_concurrency: self.store.delete_concurrency.max(1),
            list_page_size: self.store.list_page_size.max(1),
        }
    }

    /// Build the configured object-store client.
    pub async fn build_client(&self) -> anyhow::Result<Arc<dyn ObjectStoreClient>> {
        match self.backend.kind.as_str() {
            "aws" => {
                let aws_config = self.backend.aws.clone().unwrap_or_default();
                Ok(Arc::new(AwsClient::new(&aws_config).await?))
            }
            "memory" => Ok(Arc::new(MemoryClient::with_page_size(
                self.backend.memory_page_size,
            ))),
            other => anyhow::bail!("unknown backend.kind '{other}' (expected 'aws' or 'memory')"),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_bucket() -> String {
    "bucketfs".to_string()
}

fn default_write_timeout() -> u64 {
    40 * 60
}

fn default_delete_concurrency() -> usize {
    64
}

fn default_list_page_size() -> u32 {
    1000
}

fn default_conflict_retries() -> u32 {
    5
}

fn default_conflict_interval_ms() -> u64 {
    2000
}

fn default_backend_kind() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}
