//! Configuration management infrastructure
//!
//! Hierarchical configuration using figment:
//! - YAML file loading
//! - Environment variable overrides
//! - Configuration validation
//! - Live bridge settings

pub mod bridge_settings;
pub mod loader;

pub use bridge_settings::ReloadingBridgeSettings;
pub use loader::{ConfigError, ConfigLoader, CONFIG_DIR, ENV_PREFIX};
