//! Configuration management for Manga Fetcher
//!
//! This module provides file-based configuration with zero-config defaults.
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! config file, the `MANGA_FETCHER_DOWNLOAD_DIR` environment variable, and
//! finally command-line flags (applied by the CLI).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::client::ClientConfig;
use crate::app::coordinator::CoordinatorConfig;
use crate::app::worker::WorkerConfig;
use crate::constants::{config as paths, env, http, limits, logging, workers};
use crate::errors::{AppError, ConfigError, ConfigResult, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Output location and chapter-level concurrency
    pub download: DownloadConfigToml,
    /// Per-chapter image download settings
    pub worker: WorkerConfigToml,
    /// HTTP client settings
    pub client: ClientConfigToml,
    /// Archive packaging after download
    pub packaging: PackagingConfigToml,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// TOML-friendly download configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfigToml {
    /// Root directory for all downloads
    pub download_dir: PathBuf,
    /// Chapters downloaded at the same time
    pub max_concurrent_chapters: usize,
    /// Chapter URL resolutions in flight at once
    pub url_resolve_concurrency: usize,
}

impl Default for DownloadConfigToml {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from(paths::DEFAULT_DOWNLOAD_DIR),
            max_concurrent_chapters: workers::DEFAULT_MAX_CONCURRENT_CHAPTERS,
            url_resolve_concurrency: workers::DEFAULT_URL_RESOLVE_CONCURRENCY,
        }
    }
}

/// TOML-friendly worker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfigToml {
    /// Image downloads in flight per chapter
    pub max_concurrent_images: usize,
    /// Total attempts per image
    pub max_retries: u32,
    /// Per-attempt timeout in seconds
    pub timeout_secs: u64,
    /// Backoff unit in milliseconds
    pub backoff_unit_ms: u64,
}

impl Default for WorkerConfigToml {
    fn default() -> Self {
        Self {
            max_concurrent_images: workers::DEFAULT_MAX_CONCURRENT_IMAGES,
            max_retries: limits::MAX_RETRIES,
            timeout_secs: limits::ATTEMPT_TIMEOUT.as_secs(),
            backoff_unit_ms: limits::BACKOFF_UNIT.as_millis() as u64,
        }
    }
}

/// TOML-friendly client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfigToml {
    /// User agent override
    pub user_agent: Option<String>,
    /// Referer sent with every request
    pub referer: Option<String>,
    /// TCP keep-alive in seconds (None = disabled)
    pub tcp_keepalive_secs: Option<u64>,
    /// TCP nodelay setting
    pub tcp_nodelay: bool,
    /// Connection pool idle timeout in seconds (None = no timeout)
    pub pool_idle_timeout_secs: Option<u64>,
    /// Maximum idle connections per host
    pub pool_max_per_host: usize,
    /// Connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Rate limit (requests per second)
    pub rate_limit_rps: u32,
}

impl Default for ClientConfigToml {
    fn default() -> Self {
        Self {
            user_agent: None,
            referer: None,
            tcp_keepalive_secs: Some(30),
            tcp_nodelay: true,
            pool_idle_timeout_secs: Some(http::POOL_IDLE_TIMEOUT.as_secs()),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            connect_timeout_secs: http::CONNECT_TIMEOUT.as_secs(),
            rate_limit_rps: limits::DEFAULT_RATE_LIMIT_RPS,
        }
    }
}

/// Archive format produced after a chapter downloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    /// Leave images as loose files
    #[default]
    None,
    /// Comic book zip archive
    Cbz,
    /// One PDF page per image
    Pdf,
}

/// TOML-friendly packaging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackagingConfigToml {
    pub format: PackageFormat,
    /// Delete images once they are packaged
    pub delete_images: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an explicit file or the standard locations
    ///
    /// An explicit path that does not exist is an error; missing files in
    /// the standard locations just mean defaults. Environment overrides are
    /// applied last.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Self::load_from_file(&path).await?
            }
            None => match Self::find_config_file() {
                Some(path) => Self::load_from_file(&path).await?,
                None => {
                    debug!("No config file found, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var(env::DOWNLOAD_DIR) {
            if !dir.trim().is_empty() {
                debug!("Download directory overridden by {}", env::DOWNLOAD_DIR);
                self.download.download_dir = PathBuf::from(dir);
            }
        }
    }

    /// Check every section converts into a valid runtime configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.client.rate_limit_rps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "client.rate_limit_rps".to_string(),
                value: "0".to_string(),
                reason: "Rate limit must be at least 1 request per second".to_string(),
            });
        }
        self.coordinator_config().validate()
    }

    /// Write a default config file
    ///
    /// Uses `path` or the user config location. Refuses to overwrite an
    /// existing file unless `force` is set.
    pub async fn write_default(path: Option<&Path>, force: bool) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if config_path.exists() && !force {
            return Err(AppError::generic(format!(
                "Config file already exists: {} (use --force to overwrite)",
                config_path.display()
            )));
        }

        if let Some(parent) = config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let content = Self::generate_default_config_content()?;
        tokio::fs::write(&config_path, content).await?;

        info!("Wrote default configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(paths::LOCAL_CONFIG_FILE)];
        if let Ok(user_path) = Self::default_config_path() {
            search_paths.push(user_path);
        }

        let found = search_paths.into_iter().find(|path| path.exists());
        match &found {
            Some(path) => debug!("Found config file: {}", path.display()),
            None => debug!("No config file found in standard locations"),
        }
        found
    }

    /// Default config file path for the current user
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir
            .join(paths::APP_DIR_NAME)
            .join(paths::CONFIG_FILE_NAME))
    }

    async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Default configuration as commented TOML
    pub fn generate_default_config_content() -> ConfigResult<String> {
        let body = toml::to_string_pretty(&Self::default())?;
        Ok(format!(
            "# Manga Fetcher configuration\n\
             # Every setting is optional; removed keys fall back to built-in defaults.\n\
             # packaging.format is \"none\", \"cbz\" or \"pdf\".\n\n{}",
            body
        ))
    }

    /// Runtime HTTP client configuration
    pub fn client_config(&self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            user_agent: self.client.user_agent.clone().unwrap_or(defaults.user_agent),
            referer: self.client.referer.clone(),
            tcp_keepalive: self.client.tcp_keepalive_secs.map(Duration::from_secs),
            tcp_nodelay: self.client.tcp_nodelay,
            pool_idle_timeout: self.client.pool_idle_timeout_secs.map(Duration::from_secs),
            pool_max_per_host: self.client.pool_max_per_host,
            connect_timeout: Duration::from_secs(self.client.connect_timeout_secs),
            rate_limit_rps: self.client.rate_limit_rps,
        }
    }

    /// Runtime worker configuration
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            max_concurrent_images: self.worker.max_concurrent_images,
            max_retries: self.worker.max_retries,
            timeout_per_attempt: Duration::from_secs(self.worker.timeout_secs),
            backoff_unit: Duration::from_millis(self.worker.backoff_unit_ms),
        }
    }

    /// Runtime coordinator configuration
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_concurrent_chapters: self.download.max_concurrent_chapters,
            url_resolve_concurrency: self.download.url_resolve_concurrency,
            worker_config: self.worker_config(),
        }
    }
}
