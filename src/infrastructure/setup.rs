//! Project initialization
//!
//! Handles:
//! - Configuration directory creation
//! - Default config file creation
//! - Database creation and migrations

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::adapters::sqlite::{initialize_database, PoolConfig};
use crate::infrastructure::config::CONFIG_DIR;

/// Default configuration template content
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# hookwise configuration
# Override settings by editing this file, adding .hookwise/local.yaml, or
# setting environment variables with the HOOKWISE_ prefix.
#
# Example environment variables:
#   export HOOKWISE_LOGGING__LEVEL=debug
#   export HOOKWISE_BRIDGE__ENABLED=true
#   export HOOKWISE_DATABASE__PATH=/custom/path/hookwise.db

database:
  # Path to SQLite database file (project-local)
  path: ".hookwise/hookwise.db"
  max_connections: 5

logging:
  # Log level: trace, debug, info, warn, error
  level: "info"
  # Log format: json, pretty
  format: "json"
  # Uncomment to also write rolling JSON logs
  # log_dir: ".hookwise/logs"
  # Rotation for file output: daily, hourly, never
  rotation: "daily"

ingress:
  # Lifetime of a session lock left behind by a crashed holder
  lock_ttl_ms: 120000
  wait_poll_interval_ms: 150
  wait_timeout_ms: 30000
  workspace_root: ".hookwise/workspaces"
  # Temp workspaces touched within this window are never pruned
  lease_ttl_ms: 21600000

triggers:
  history_limit: 50
  default_cooldown_ms: 60000

bridge:
  enabled: false
  binary: "bird"
  # Arguments placed before every bird subcommand
  # extra_args: ["--account", "main"]
  prefix: "do:"
  # Handles allowed to issue commands; an empty list accepts nobody
  allowlist: []
  fetch_count: 25
  timeout_ms: 45000
  poll_interval_ms: 60000
  native_channel_active: false

server:
  # Local listener started by `hookwise run`: POST /events/<source> with a JSON object
  enabled: true
  host: "127.0.0.1"
  port: 9180

delivery:
  # message_webhook_url: "http://localhost:8080/messages"
  # agent_wake_url: "http://localhost:8080/wake"
  timeout_ms: 10000
"#;

/// Paths used by project setup
#[derive(Debug, Clone)]
pub struct SetupPaths {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
    pub workspaces_dir: PathBuf,
}

impl SetupPaths {
    /// Setup paths under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config_dir = root.join(CONFIG_DIR);
        Self {
            config_file: config_dir.join("config.yaml"),
            database_file: config_dir.join("hookwise.db"),
            workspaces_dir: config_dir.join("workspaces"),
            config_dir,
            root,
        }
    }

    /// Check if hookwise is already initialized
    pub fn is_initialized(&self) -> bool {
        self.config_file.exists() && self.database_file.exists()
    }

    fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.root).unwrap_or(path).to_string_lossy().to_string()
    }
}

/// Create the configuration and workspace directories, returning those that were new.
pub fn create_directories(paths: &SetupPaths) -> Result<Vec<String>> {
    let mut created = Vec::new();
    for dir in [&paths.config_dir, &paths.workspaces_dir] {
        if !dir.exists() {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
            created.push(paths.relative(dir));
        }
    }
    Ok(created)
}

/// Write the default configuration file. Returns whether a file was written.
pub fn create_config_file(paths: &SetupPaths, force: bool) -> Result<bool> {
    if paths.config_file.exists() && !force {
        return Ok(false);
    }

    fs::write(&paths.config_file, DEFAULT_CONFIG_TEMPLATE).context("Failed to write config file")?;
    Ok(true)
}

/// Create the database if needed and apply pending migrations.
pub async fn run_migrations(paths: &SetupPaths) -> Result<()> {
    let db_url = format!("sqlite:{}", paths.database_file.display());
    let pool = initialize_database(&db_url, PoolConfig::default())
        .await
        .context("Failed to initialize database")?;
    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Config;
    use crate::infrastructure::config::ConfigLoader;

    #[test]
    fn test_template_matches_defaults() {
        let from_template: Config = serde_yaml::from_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        let defaults = Config::default();
        assert_eq!(from_template.database.path, defaults.database.path);
        assert_eq!(from_template.ingress.lease_ttl_ms, defaults.ingress.lease_ttl_ms);
        assert_eq!(from_template.bridge, defaults.bridge);
        assert_eq!(from_template.server.base_url(), defaults.server.base_url());
        ConfigLoader::validate(&from_template).unwrap();
    }

    #[test]
    fn test_config_file_respects_force() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SetupPaths::new(dir.path());
        create_directories(&paths).unwrap();

        assert!(create_config_file(&paths, false).unwrap());
        fs::write(&paths.config_file, "logging:\n  level: debug\n").unwrap();
        assert!(!create_config_file(&paths, false).unwrap());
        assert!(fs::read_to_string(&paths.config_file).unwrap().contains("debug"));

        assert!(create_config_file(&paths, true).unwrap());
        assert_eq!(fs::read_to_string(&paths.config_file).unwrap(), DEFAULT_CONFIG_TEMPLATE);
    }

    #[tokio::test]
    async fn test_migrations_create_database() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SetupPaths::new(dir.path());
        create_directories(&paths).unwrap();
        create_config_file(&paths, false).unwrap();
        run_migrations(&paths).await.unwrap();
        assert!(paths.is_initialized());
    }
}
