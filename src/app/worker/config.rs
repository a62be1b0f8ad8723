//! Chapter worker configuration management
//!
//! This module provides configuration structures and validation for chapter
//! workers, with sensible defaults and presets for production and tests.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{limits, workers};
use crate::errors::{ConfigError, ConfigResult};

/// Configuration for chapter workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Size of the per-chapter image download pool
    pub max_concurrent_images: usize,
    /// Total attempts per image
    pub max_retries: u32,
    /// Time budget for a single attempt
    pub timeout_per_attempt: Duration,
    /// Backoff unit; the delay after failed attempt k is `(2^k + 1)` units
    pub backoff_unit: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_images: workers::DEFAULT_MAX_CONCURRENT_IMAGES,
            max_retries: limits::MAX_RETRIES,
            timeout_per_attempt: limits::ATTEMPT_TIMEOUT,
            backoff_unit: limits::BACKOFF_UNIT,
        }
    }
}

impl WorkerConfig {
    /// Validate configuration values and return errors for invalid settings
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_concurrent_images == 0 {
            return Err(invalid(
                "max_concurrent_images",
                self.max_concurrent_images,
                "Image pool size cannot be zero",
            ));
        }

        if self.max_concurrent_images > workers::MAX_WORKER_COUNT {
            return Err(invalid(
                "max_concurrent_images",
                self.max_concurrent_images,
                format!("Image pool size exceeds maximum ({})", workers::MAX_WORKER_COUNT),
            ));
        }

        if self.max_retries == 0 {
            return Err(invalid(
                "max_retries",
                self.max_retries,
                "At least one attempt is required",
            ));
        }

        if self.timeout_per_attempt.is_zero() {
            return Err(invalid(
                "timeout_per_attempt",
                "0s",
                "Attempt timeout must be positive",
            ));
        }

        Ok(())
    }
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// Builder for WorkerConfig
#[derive(Debug, Default)]
pub struct WorkerConfigBuilder {
    config: WorkerConfig,
}

impl WorkerConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: WorkerConfig::default(),
        }
    }

    /// Set the image pool size
    pub fn max_concurrent_images(mut self, count: usize) -> Self {
        self.config.max_concurrent_images = count;
        self
    }

    /// Set total attempts per image
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the per-attempt timeout
    pub fn timeout_per_attempt(mut self, timeout: Duration) -> Self {
        self.config.timeout_per_attempt = timeout;
        self
    }

    /// Set the backoff unit
    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.config.backoff_unit = unit;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> ConfigResult<WorkerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }

    /// Build without validation (for testing)
    pub fn build_unchecked(self) -> WorkerConfig {
        self.config
    }
}

/// Configuration presets for different scenarios
pub struct ConfigPresets;

impl ConfigPresets {
    /// Production configuration: one-second backoff unit, 30s attempts
    pub fn production() -> WorkerConfig {
        WorkerConfig::default()
    }

    /// Polite configuration for hosts that throttle aggressively
    pub fn gentle() -> WorkerConfig {
        WorkerConfig {
            max_concurrent_images: 2,
            max_retries: 5,
            ..Default::default()
        }
    }

    /// Testing configuration with millisecond backoff and short timeouts
    pub fn testing() -> WorkerConfig {
        WorkerConfig {
            max_concurrent_images: 2,
            max_retries: 3,
            timeout_per_attempt: Duration::from_secs(5),
            backoff_unit: Duration::from_millis(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test WorkerConfig default values match constants
    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_images, 5);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout_per_attempt, Duration::from_secs(30));
        assert_eq!(config.backoff_unit, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    /// Test configuration validation catches invalid values
    ///
    /// Zero-sized pools, zero attempts and zero timeouts are all rejected,
    /// as is a pool larger than the hard worker cap.
    #[test]
    fn test_config_validation() {
        let config = WorkerConfig {
            max_concurrent_images: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "max_concurrent_images"
        ));

        let config = WorkerConfig {
            max_concurrent_images: workers::MAX_WORKER_COUNT + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkerConfig {
            max_retries: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = WorkerConfig {
            timeout_per_attempt: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = WorkerConfigBuilder::new()
            .max_concurrent_images(8)
            .max_retries(5)
            .timeout_per_attempt(Duration::from_secs(10))
            .backoff_unit(Duration::from_millis(250))
            .build()
            .unwrap();

        assert_eq!(config.max_concurrent_images, 8);
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout_per_attempt, Duration::from_secs(10));
        assert_eq!(config.backoff_unit, Duration::from_millis(250));

        assert!(WorkerConfigBuilder::new()
            .max_concurrent_images(0)
            .build()
            .is_err());
        assert_eq!(
            WorkerConfigBuilder::new()
                .max_concurrent_images(0)
                .build_unchecked()
                .max_concurrent_images,
            0
        );
    }

    #[test]
    fn test_config_presets() {
        let prod = ConfigPresets::production();
        let gentle = ConfigPresets::gentle();
        let test = ConfigPresets::testing();

        assert!(prod.validate().is_ok());
        assert!(gentle.validate().is_ok());
        assert!(test.validate().is_ok());

        assert!(gentle.max_concurrent_images < prod.max_concurrent_images);
        assert!(test.backoff_unit < prod.backoff_unit);
        assert!(test.timeout_per_attempt < prod.timeout_per_attempt);
    }
}
