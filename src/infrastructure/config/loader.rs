use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Directory holding project configuration, relative to the working directory.
pub const CONFIG_DIR: &str = ".hookwise";

/// Prefix of environment overrides; nested keys are separated by `__`.
pub const ENV_PREFIX: &str = "HOOKWISE_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Bridge prefix cannot be empty")]
    EmptyBridgePrefix,

    #[error("Bridge binary cannot be empty")]
    EmptyBridgeBinary,

    #[error("Invalid bridge fetch_count: {0}. Must be at least 1")]
    InvalidFetchCount(u32),

    #[error("Invalid lock_ttl_ms: {0}. Must be positive")]
    InvalidLockTtl(u64),

    #[error("Server host cannot be empty")]
    EmptyServerHost,

    #[error("Invalid wait window: poll interval {0}ms must be positive and not exceed timeout {1}ms")]
    InvalidWaitWindow(u64, u64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the current working directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. .hookwise/config.yaml
    /// 3. .hookwise/local.yaml (optional local overrides)
    /// 4. HOOKWISE_* environment variables
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Same as [`ConfigLoader::load`] with `.hookwise/` resolved under `base`.
    pub fn load_from_dir(base: impl AsRef<Path>) -> Result<Config> {
        let dir = base.as_ref().join(CONFIG_DIR);
        let config: Config = Self::figment(&dir)
            .extract()
            .with_context(|| format!("Failed to extract configuration under {}", dir.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, ignoring environment overrides.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment(dir: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        if !["json", "pretty"].contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        if !["daily", "hourly", "never"].contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        let ingress = &config.ingress;
        if ingress.lock_ttl_ms == 0 {
            return Err(ConfigError::InvalidLockTtl(ingress.lock_ttl_ms));
        }
        if ingress.wait_poll_interval_ms == 0 || ingress.wait_poll_interval_ms > ingress.wait_timeout_ms {
            return Err(ConfigError::InvalidWaitWindow(
                ingress.wait_poll_interval_ms,
                ingress.wait_timeout_ms,
            ));
        }

        let bridge = &config.bridge;
        if bridge.prefix.trim().is_empty() {
            return Err(ConfigError::EmptyBridgePrefix);
        }
        if bridge.binary.trim().is_empty() {
            return Err(ConfigError::EmptyBridgeBinary);
        }
        if bridge.fetch_count == 0 {
            return Err(ConfigError::InvalidFetchCount(bridge.fetch_count));
        }

        if config.server.host.trim().is_empty() {
            return Err(ConfigError::EmptyServerHost);
        }

        Ok(())
    }
}
