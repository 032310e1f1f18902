//! Configuration Loader
//!
//! Environment-aware configuration loading. Handles file discovery,
//! environment detection and layering of overrides.

use super::error::{ConfigResult, ConfigurationError};
use super::{WorkQueueConfig, ENV_PREFIX, ENV_SEPARATOR};
use config::{Config, Environment, File};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Base name of configuration files inside the configuration directory
const CONFIG_FILE_STEM: &str = "workqueue";

/// Loaded configuration together with where it came from
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: WorkQueueConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    /// This is useful for testing without modifying global environment variables
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config_dir, environment, None)
    }

    /// Load configuration with an explicit set of `WORKQUEUE__*` overrides
    /// used in place of the process environment
    pub fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: config::Map<String, String>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        Self::build(config_dir, environment, Some(overrides))
    }

    fn build(
        config_dir: Option<PathBuf>,
        environment: &str,
        overrides: Option<config::Map<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let base_path = config_directory.join(CONFIG_FILE_STEM);
        let env_path = config_directory.join(format!("{CONFIG_FILE_STEM}.{environment}"));

        let env_source = Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true)
            .source(overrides);

        let config: WorkQueueConfig = Config::builder()
            .add_source(File::with_name(&path_to_str(&base_path)?).required(false))
            .add_source(File::with_name(&path_to_str(&env_path)?).required(false))
            .add_source(env_source)
            .build()?
            .try_deserialize()?;

        config.validate()?;

        info!(
            environment = %environment,
            queue_name = %config.queue.name,
            capacity = config.queue.capacity,
            consumers = config.pipeline.consumers,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &WorkQueueConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// Configuration as JSON for diagnostics
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::to_value(&self.config).unwrap_or(serde_json::Value::Null)
    }

    /// Detect the environment from `WORKQUEUE_ENV`, then `APP_ENV`
    pub fn detect_environment() -> String {
        env::var("WORKQUEUE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    /// `WORKQUEUE_CONFIG_DIR` if set, otherwise `./config`
    fn default_config_directory() -> PathBuf {
        env::var("WORKQUEUE_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }
}

fn path_to_str(path: &Path) -> ConfigResult<String> {
    path.to_str().map(str::to_string).ok_or_else(|| {
        ConfigurationError::invalid_value(
            "config_directory",
            path.display().to_string(),
            "configuration path must be valid UTF-8",
        )
    })
}
