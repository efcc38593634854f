use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::RwLock;

use super::loader::ConfigLoader;
use crate::domain::models::BridgeConfig;
use crate::domain::ports::BridgeSettingsSource;

/// Bridge settings re-read from the project configuration on every call.
///
/// The YAML files are read on the blocking pool. A load or validation failure
/// keeps the last good settings and logs a warning.
pub struct ReloadingBridgeSettings {
    base: PathBuf,
    last_good: RwLock<BridgeConfig>,
}

impl ReloadingBridgeSettings {
    pub fn new(base: impl Into<PathBuf>, initial: BridgeConfig) -> Self {
        Self {
            base: base.into(),
            last_good: RwLock::new(initial),
        }
    }

    fn cached(&self) -> BridgeConfig {
        match self.last_good.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn remember(&self, bridge: &BridgeConfig) {
        if let Ok(mut guard) = self.last_good.write() {
            if *guard != *bridge {
                tracing::info!(
                    enabled = bridge.enabled,
                    poll_interval_ms = bridge.poll_interval_ms,
                    "bridge settings changed"
                );
                guard.clone_from(bridge);
            }
        }
    }
}

#[async_trait]
impl BridgeSettingsSource for ReloadingBridgeSettings {
    async fn current(&self) -> BridgeConfig {
        let base = self.base.clone();
        let loaded = tokio::task::spawn_blocking(move || ConfigLoader::load_from_dir(base)).await;

        match loaded {
            Ok(Ok(config)) => {
                self.remember(&config.bridge);
                config.bridge
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to reload bridge settings; keeping previous");
                self.cached()
            }
            Err(e) => {
                tracing::warn!(error = %e, "bridge settings reload task failed; keeping previous");
                self.cached()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::CONFIG_DIR;

    #[test]
    fn test_picks_up_changes_and_keeps_last_good() {
        let dir = tempfile::tempdir().unwrap();
        let config_dir = dir.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        let file = config_dir.join("config.yaml");

        temp_env::with_vars_unset(["HOOKWISE_BRIDGE__ENABLED", "HOOKWISE_BRIDGE__POLL_INTERVAL_MS"], || {
            let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let source = ReloadingBridgeSettings::new(dir.path(), BridgeConfig::default());

            std::fs::write(&file, "bridge:\n  enabled: true\n  poll_interval_ms: 120000\n").unwrap();
            let first = runtime.block_on(source.current());
            assert!(first.enabled);
            assert_eq!(first.poll_interval_ms, 120_000);

            std::fs::write(&file, "bridge:\n  fetch_count: 0\n").unwrap();
            assert_eq!(runtime.block_on(source.current()), first);
        });
    }
}
