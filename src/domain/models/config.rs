use serde::{Deserialize, Serialize};

use super::mention::MentionTriggerSettings;

/// Main configuration structure for hookwise
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Task ingress and temp workspace configuration
    #[serde(default)]
    pub ingress: IngressConfig,

    /// Trigger engine configuration
    #[serde(default)]
    pub triggers: TriggersConfig,

    /// Mention polling bridge configuration
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Outbound delivery endpoints for send_message / wake_agent actions
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Local event listener started by `hookwise run`
    #[serde(default)]
    pub server: ServerConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".hookwise/hookwise.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// sqlx connection URL for the configured path.
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation for file output: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Task ingress configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct IngressConfig {
    /// TTL of a session lock row; only matters if a holder crashes
    #[serde(default = "default_lock_ttl_ms")]
    pub lock_ttl_ms: u64,

    /// Interval between mapping checks while another caller holds the lock
    #[serde(default = "default_wait_poll_interval_ms")]
    pub wait_poll_interval_ms: u64,

    /// Maximum time to wait for another caller's mapping to appear
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,

    /// Root directory for temp workspaces
    #[serde(default = "default_workspace_root")]
    pub workspace_root: String,

    /// How long a touched temp workspace is protected from pruning
    #[serde(default = "default_lease_ttl_ms")]
    pub lease_ttl_ms: u64,
}

const fn default_lock_ttl_ms() -> u64 {
    120_000
}

const fn default_wait_poll_interval_ms() -> u64 {
    150
}

const fn default_wait_timeout_ms() -> u64 {
    30_000
}

fn default_workspace_root() -> String {
    ".hookwise/workspaces".to_string()
}

const fn default_lease_ttl_ms() -> u64 {
    6 * 60 * 60 * 1000
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            lock_ttl_ms: default_lock_ttl_ms(),
            wait_poll_interval_ms: default_wait_poll_interval_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
            workspace_root: default_workspace_root(),
            lease_ttl_ms: default_lease_ttl_ms(),
        }
    }
}

/// Trigger engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TriggersConfig {
    /// History entries kept per trigger
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Cooldown applied to triggers created without one
    #[serde(default = "default_cooldown_ms")]
    pub default_cooldown_ms: u64,
}

const fn default_history_limit() -> usize {
    super::trigger::DEFAULT_HISTORY_LIMIT
}

const fn default_cooldown_ms() -> u64 {
    super::trigger::DEFAULT_COOLDOWN_MS
}

impl Default for TriggersConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            default_cooldown_ms: default_cooldown_ms(),
        }
    }
}

/// Mention polling bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Whether the bridge polls at all
    #[serde(default)]
    pub enabled: bool,

    /// External mention CLI binary
    #[serde(default = "default_bridge_binary")]
    pub binary: String,

    /// Arguments placed before every bird subcommand, e.g. `["--account", "main"]`
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Command prefix, e.g. `do:`
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Authors allowed to issue commands
    #[serde(default)]
    pub allowlist: Vec<String>,

    /// Mentions requested per poll
    #[serde(default = "default_fetch_count")]
    pub fetch_count: u32,

    /// Fetch timeout; never applied below 45s
    #[serde(default = "default_fetch_timeout_ms")]
    pub timeout_ms: u64,

    /// Poll cadence; never applied below 30s
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Set when a native push channel already delivers the same mentions
    #[serde(default)]
    pub native_channel_active: bool,
}

fn default_bridge_binary() -> String {
    "bird".to_string()
}

fn default_prefix() -> String {
    "do:".to_string()
}

const fn default_fetch_count() -> u32 {
    25
}

const fn default_fetch_timeout_ms() -> u64 {
    45_000
}

const fn default_poll_interval_ms() -> u64 {
    60_000
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: default_bridge_binary(),
            extra_args: Vec::new(),
            prefix: default_prefix(),
            allowlist: Vec::new(),
            fetch_count: default_fetch_count(),
            timeout_ms: default_fetch_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            native_channel_active: false,
        }
    }
}

impl BridgeConfig {
    /// Command-parser view of this configuration.
    pub fn trigger_settings(&self) -> MentionTriggerSettings {
        MentionTriggerSettings {
            prefix: self.prefix.clone(),
            allowlist: self.allowlist.clone(),
        }
    }
}

/// Outbound delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DeliveryConfig {
    /// Endpoint receiving send_message payloads
    #[serde(default)]
    pub message_webhook_url: Option<String>,

    /// Endpoint receiving wake_agent payloads
    #[serde(default)]
    pub agent_wake_url: Option<String>,

    /// Request timeout
    #[serde(default = "default_delivery_timeout_ms")]
    pub timeout_ms: u64,
}

const fn default_delivery_timeout_ms() -> u64 {
    10_000
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            message_webhook_url: None,
            agent_wake_url: None,
            timeout_ms: default_delivery_timeout_ms(),
        }
    }
}

/// Local event listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Whether `hookwise run` accepts events over HTTP
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,

    /// Bind address
    #[serde(default = "default_server_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_server_port")]
    pub port: u16,
}

const fn default_server_enabled() -> bool {
    true
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_server_port() -> u16 {
    9180
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl ServerConfig {
    /// Base URL clients use to reach the listener.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
