//! Wiring shared by every command: configuration, database and services.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::bird::{BirdCliConfig, BirdCliFetcher};
use crate::adapters::delivery::{WebhookDelivery, WebhookDeliveryConfig};
use crate::adapters::sqlite::{
    initialize_database, PoolConfig, SqliteHookSessionRepository, SqliteTaskQueue, SqliteTriggerRepository,
    SqliteWorkspaceRepository,
};
use crate::domain::models::Config;
use crate::domain::ports::BridgeSettingsSource;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{
    FieldConditionEvaluator, IngressCoordinator, IngressSettings, MentionBridge, TempWorkspaceManager, TriggerEngine,
};

pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub triggers: Arc<SqliteTriggerRepository>,
    pub sessions: Arc<SqliteHookSessionRepository>,
    pub tasks: Arc<SqliteTaskQueue>,
    pub ingress: Arc<IngressCoordinator>,
}

impl AppContext {
    /// Load configuration from the working directory and open the database.
    pub async fn load() -> Result<Self> {
        let config = ConfigLoader::load().context("Failed to load configuration")?;
        Self::open(config).await
    }

    pub async fn open(config: Config) -> Result<Self> {
        let pool = initialize_database(&config.database.url(), PoolConfig::from(&config.database))
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;

        let triggers = Arc::new(SqliteTriggerRepository::new(pool.clone()));
        let sessions = Arc::new(SqliteHookSessionRepository::new(pool.clone()));
        let tasks = Arc::new(SqliteTaskQueue::new(pool.clone()));
        let workspaces = Arc::new(TempWorkspaceManager::new(
            Arc::new(SqliteWorkspaceRepository::new(pool.clone())),
            config.ingress.workspace_root.clone(),
            Duration::from_millis(config.ingress.lease_ttl_ms),
        ));
        let ingress = Arc::new(IngressCoordinator::new(
            sessions.clone(),
            tasks.clone(),
            workspaces,
            IngressSettings::from(&config.ingress),
        ));

        Ok(Self {
            config,
            pool,
            triggers,
            sessions,
            tasks,
            ingress,
        })
    }

    /// A started trigger engine with webhook delivery attached where configured.
    pub async fn trigger_engine(&self) -> Result<TriggerEngine> {
        let mut engine = TriggerEngine::new(
            self.triggers.clone(),
            Arc::new(FieldConditionEvaluator::new()),
            self.ingress.clone(),
        )
        .with_history_limit(self.config.triggers.history_limit)
        .with_default_cooldown_ms(self.config.triggers.default_cooldown_ms);

        let delivery_config = &self.config.delivery;
        if delivery_config.message_webhook_url.is_some() || delivery_config.agent_wake_url.is_some() {
            let delivery = Arc::new(
                WebhookDelivery::new(WebhookDeliveryConfig::from(delivery_config))
                    .context("Failed to build webhook delivery client")?,
            );
            if delivery_config.message_webhook_url.is_some() {
                engine = engine.with_delivery(delivery.clone());
            }
            if delivery_config.agent_wake_url.is_some() {
                engine = engine.with_waker(delivery);
            }
        }

        engine.start().await.context("Failed to load triggers")?;
        Ok(engine)
    }

    pub fn mention_fetcher(&self) -> BirdCliFetcher {
        BirdCliFetcher::new(BirdCliConfig::from(&self.config.bridge))
    }

    pub fn mention_bridge(&self, settings: Arc<dyn BridgeSettingsSource>) -> Arc<MentionBridge> {
        Arc::new(MentionBridge::new(
            Arc::new(self.mention_fetcher()),
            settings,
            self.ingress.clone(),
        ))
    }
}
