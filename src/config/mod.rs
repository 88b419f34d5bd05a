//! Configuration management for s3-thaw
//!
//! This module handles loading and validating configuration from environment
//! variables, TOML files, and command-line overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::remote::RetrievalTier;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Object store connection
    pub remote: RemoteConfig,

    /// Restore request parameters
    pub restore: RestoreConfig,

    /// Worker pool and progress settings
    pub batch: BatchConfig,

    /// Location of key lists and logs
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Object store connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Endpoint override (S3-compatible stores, local testing)
    pub endpoint: Option<String>,

    /// Region used for the default endpoint and request signing
    pub region: String,

    /// Credentials profile
    pub profile: String,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Restore request parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// How long restored copies stay available
    pub retain_days: u32,

    /// Retrieval tier
    pub tier: RetrievalTier,
}

/// Worker pool and progress settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Requested number of concurrent workers
    pub thread_count: usize,

    /// Restore requests a single worker completes per second
    pub restore_throughput_per_thread: f64,

    /// Status checks a single worker completes per second
    pub check_throughput_per_thread: f64,

    /// Progress poll interval while requesting restores
    pub restore_poll_interval_ms: u64,

    /// Progress poll interval while checking status
    pub check_poll_interval_ms: u64,
}

/// Storage location settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `<bucket>.objects`, `.progress` and `.available`
    pub work_dir: PathBuf,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: String::from("us-east-1"),
            profile: String::from("default"),
            request_timeout_secs: 30,
        }
    }
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            retain_days: 1,
            tier: RetrievalTier::Standard,
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            restore_throughput_per_thread: 5.0,
            check_throughput_per_thread: 14.0,
            restore_poll_interval_ms: 1000,
            check_poll_interval_ms: 100,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let endpoint = std::env::var("S3THAW_ENDPOINT").ok().filter(|v| !v.is_empty());

        let region = std::env::var("S3THAW_REGION")
            .or_else(|_| std::env::var("AWS_REGION"))
            .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
            .unwrap_or(defaults.remote.region);

        let profile = std::env::var("AWS_PROFILE").unwrap_or(defaults.remote.profile);

        let request_timeout_secs = std::env::var("S3THAW_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.remote.request_timeout_secs);

        let retain_days = std::env::var("S3THAW_RETAIN_DAYS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(defaults.restore.retain_days);

        let tier = match std::env::var("S3THAW_RETRIEVAL_TIER") {
            Ok(v) => v
                .parse::<RetrievalTier>()
                .map_err(anyhow::Error::msg)
                .context("Invalid S3THAW_RETRIEVAL_TIER")?,
            Err(_) => defaults.restore.tier,
        };

        let thread_count = std::env::var("S3THAW_THREAD_COUNT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults.batch.thread_count);

        let work_dir = std::env::var("S3THAW_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.storage.work_dir);

        let level = std::env::var("S3THAW_LOG_LEVEL").unwrap_or(defaults.logging.level);
        let format = std::env::var("S3THAW_LOG_FORMAT").unwrap_or(defaults.logging.format);

        Ok(Self {
            remote: RemoteConfig {
                endpoint,
                region,
                profile,
                request_timeout_secs,
            },
            restore: RestoreConfig { retain_days, tier },
            batch: BatchConfig {
                thread_count,
                ..defaults.batch
            },
            storage: StorageConfig { work_dir },
            logging: LoggingConfig { level, format },
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.batch.thread_count == 0 {
            return Err(Error::config("thread_count must be greater than 0"));
        }

        if self.batch.restore_throughput_per_thread <= 0.0
            || self.batch.check_throughput_per_thread <= 0.0
        {
            return Err(Error::config("per-thread throughput must be positive"));
        }

        if self.batch.restore_poll_interval_ms == 0 || self.batch.check_poll_interval_ms == 0 {
            return Err(Error::config("poll intervals must be greater than 0"));
        }

        if self.restore.retain_days == 0 {
            return Err(Error::config("retain_days must be at least 1"));
        }

        if self.remote.region.is_empty() {
            return Err(Error::config("region must not be empty"));
        }

        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout_secs)
    }
}

fn default_thread_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
