//! Port supplying bridge settings, re-read on every poll.

use async_trait::async_trait;

use crate::domain::models::BridgeConfig;

/// Source of the bridge's current settings.
#[async_trait]
pub trait BridgeSettingsSource: Send + Sync {
    async fn current(&self) -> BridgeConfig;
}
