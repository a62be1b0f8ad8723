//! Configuration structures for the download coordinator
//!
//! This module defines the coordinator's two concurrency limits and carries
//! the configuration handed to every chapter worker.

use serde::{Deserialize, Serialize};

use crate::app::worker::WorkerConfig;
use crate::constants::workers;
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for the download coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Chapters downloaded at the same time; 1 processes chapters strictly in order
    pub max_concurrent_chapters: usize,
    /// Chapter URL resolutions in flight at once
    pub url_resolve_concurrency: usize,
    /// Worker configuration
    pub worker_config: WorkerConfig,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_chapters: workers::DEFAULT_MAX_CONCURRENT_CHAPTERS,
            url_resolve_concurrency: workers::DEFAULT_URL_RESOLVE_CONCURRENCY,
            worker_config: WorkerConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Set the chapter concurrency limit
    pub fn with_max_concurrent_chapters(mut self, count: usize) -> Self {
        self.max_concurrent_chapters = count;
        self
    }

    /// Set the URL resolution concurrency limit
    pub fn with_url_resolve_concurrency(mut self, count: usize) -> Self {
        self.url_resolve_concurrency = count;
        self
    }

    /// Replace the worker configuration
    pub fn with_worker_config(mut self, worker_config: WorkerConfig) -> Self {
        self.worker_config = worker_config;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("max_concurrent_chapters", self.max_concurrent_chapters),
            ("url_resolve_concurrency", self.url_resolve_concurrency),
        ] {
            if value == 0 || value > workers::MAX_WORKER_COUNT {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                    reason: format!("Must be between 1 and {}", workers::MAX_WORKER_COUNT),
                });
            }
        }

        self.worker_config.validate()
    }
}
