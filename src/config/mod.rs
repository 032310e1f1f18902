//! # Work Queue Configuration
//!
//! Layered configuration built on the `config` crate:
//!
//! 1. Built-in defaults (`#[serde(default)]` on every section)
//! 2. `config/workqueue.toml`
//! 3. `config/workqueue.{environment}.toml`
//! 4. `WORKQUEUE__SECTION__KEY` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use workqueue_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let capacity = manager.config().queue.capacity;
//! let delay = manager.config().backoff.max_delay();
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::messaging::registry::validate_queue_name;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "WORKQUEUE";
/// Separator between prefix, section and key in environment variable overrides
pub const ENV_SEPARATOR: &str = "__";

/// Root configuration structure mirroring workqueue.toml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkQueueConfig {
    /// Queue sizing and deadlines
    pub queue: QueueConfig,
    /// Retry delays for the polling backend
    pub backoff: BackoffConfig,
    /// Producer/consumer fan-out
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    pub name: String,
    /// Maximum number of messages held at once
    pub capacity: usize,
    /// Deadline for `put`; waits indefinitely when unset
    pub put_timeout_ms: Option<u64>,
    /// Deadline for `get`; waits indefinitely when unset
    pub get_timeout_ms: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            capacity: 100,
            put_timeout_ms: None,
            get_timeout_ms: None,
        }
    }
}

impl QueueConfig {
    pub fn put_timeout(&self) -> Option<Duration> {
        self.put_timeout_ms.map(Duration::from_millis)
    }

    pub fn get_timeout(&self) -> Option<Duration> {
        self.get_timeout_ms.map(Duration::from_millis)
    }
}

/// Randomized retry delay window; each retry sleeps a uniform duration in
/// `[min_delay_ms, max_delay_ms]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 1000,
        }
    }
}

impl BackoffConfig {
    pub fn min_delay(&self) -> Duration {
        Duration::from_millis(self.min_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of consumers draining the queue
    pub consumers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { consumers: 1 }
    }
}

impl WorkQueueConfig {
    /// Build configuration from defaults and environment variables only
    pub fn from_env() -> ConfigResult<Self> {
        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the queue cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.queue.capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "queue.capacity",
                "0",
                "capacity must be greater than zero",
            ));
        }

        validate_queue_name(&self.queue.name).map_err(|e| {
            ConfigurationError::invalid_value("queue.name", self.queue.name.clone(), e.to_string())
        })?;

        if self.backoff.min_delay_ms > self.backoff.max_delay_ms {
            return Err(ConfigurationError::invalid_value(
                "backoff.min_delay_ms",
                self.backoff.min_delay_ms.to_string(),
                format!(
                    "must not exceed backoff.max_delay_ms ({})",
                    self.backoff.max_delay_ms
                ),
            ));
        }

        if self.pipeline.consumers == 0 {
            return Err(ConfigurationError::invalid_value(
                "pipeline.consumers",
                "0",
                "at least one consumer is required",
            ));
        }

        Ok(())
    }
}
