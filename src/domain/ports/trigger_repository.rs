//! Repository port for trigger definitions and their fire history.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Trigger, TriggerHistoryEntry};

/// Durable storage for triggers and bounded per-trigger history.
#[async_trait]
pub trait TriggerRepository: Send + Sync {
    /// Insert a new trigger.
    async fn create(&self, trigger: &Trigger) -> DomainResult<()>;

    /// Get a trigger by ID.
    async fn get(&self, id: Uuid) -> DomainResult<Option<Trigger>>;

    /// Overwrite every column of an existing trigger.
    async fn update(&self, trigger: &Trigger) -> DomainResult<()>;

    /// Persist only the fire bookkeeping of a trigger.
    async fn update_fire_state(
        &self,
        id: Uuid,
        last_fired_at: DateTime<Utc>,
        fire_count: u64,
    ) -> DomainResult<()>;

    /// Delete a trigger together with its history.
    async fn delete(&self, id: Uuid) -> DomainResult<()>;

    /// List all triggers, optionally scoped to a workspace.
    ///
    /// Rows that fail to decode are skipped and logged.
    async fn list(&self, workspace_id: Option<&str>) -> DomainResult<Vec<Trigger>>;

    /// Append a history entry, keeping only the newest `keep` entries for its trigger.
    async fn append_history(&self, entry: &TriggerHistoryEntry, keep: usize) -> DomainResult<()>;

    /// Newest-first history for a trigger.
    async fn history(&self, trigger_id: Uuid, limit: usize) -> DomainResult<Vec<TriggerHistoryEntry>>;
}
