//! Trigger engine: evaluates persisted trigger rules against inbound events.
//!
//! The engine keeps every trigger in an in-memory map mirrored to the
//! [`TriggerRepository`]. Cooldown gating and the fire stamp happen together
//! under the map's write lock, before any action runs, so two concurrent
//! matching events fire a trigger at most once per cooldown window.

use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    AgentAction, CreateTaskOptions, NewTrigger, TempWorkspaceKey, Trigger, TriggerAction, TriggerEvent,
    TriggerHistoryEntry, TriggerUpdate, DEFAULT_COOLDOWN_MS, DEFAULT_HISTORY_LIMIT,
};
use crate::domain::ports::{AgentWaker, ChannelDelivery, ConditionEvaluator, TriggerRepository};
use crate::services::ingress::IngressCoordinator;
use crate::services::template::substitute_template;

/// Temp workspace scope for tasks created by triggers that name no workspace.
pub const TRIGGER_TEMP_SCOPE: &str = "triggers";

pub struct TriggerEngine {
    triggers: RwLock<HashMap<Uuid, Trigger>>,
    running: AtomicBool,
    repo: Arc<dyn TriggerRepository>,
    evaluator: Arc<dyn ConditionEvaluator>,
    ingress: Arc<IngressCoordinator>,
    delivery: Option<Arc<dyn ChannelDelivery>>,
    waker: Option<Arc<dyn AgentWaker>>,
    history_limit: usize,
    default_cooldown_ms: u64,
}

impl TriggerEngine {
    pub fn new(
        repo: Arc<dyn TriggerRepository>,
        evaluator: Arc<dyn ConditionEvaluator>,
        ingress: Arc<IngressCoordinator>,
    ) -> Self {
        Self {
            triggers: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            repo,
            evaluator,
            ingress,
            delivery: None,
            waker: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
            default_cooldown_ms: DEFAULT_COOLDOWN_MS,
        }
    }

    pub fn with_delivery(mut self, delivery: Arc<dyn ChannelDelivery>) -> Self {
        self.delivery = Some(delivery);
        self
    }

    pub fn with_waker(mut self, waker: Arc<dyn AgentWaker>) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit.max(1);
        self
    }

    pub fn with_default_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.default_cooldown_ms = cooldown_ms;
        self
    }

    /// Load every persisted trigger and begin accepting events.
    /// Malformed rows are skipped by the repository. Returns the number loaded.
    pub async fn start(&self) -> DomainResult<usize> {
        let loaded = self.repo.list(None).await?;
        let count = loaded.len();
        {
            let mut triggers = self.triggers.write().await;
            triggers.clear();
            triggers.extend(loaded.into_iter().map(|t| (t.id, t)));
        }
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(triggers = count, "trigger engine started");
        Ok(count)
    }

    /// Stop accepting events. In-flight actions finish normally.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("trigger engine stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn add_trigger(&self, mut input: NewTrigger) -> DomainResult<Trigger> {
        if input.cooldown_ms.is_none() {
            input.cooldown_ms = Some(self.default_cooldown_ms);
        }
        let trigger = Trigger::from_new(input)?;
        self.repo.create(&trigger).await?;
        self.triggers.write().await.insert(trigger.id, trigger.clone());
        tracing::info!(trigger_id = %trigger.id, name = %trigger.name, source = %trigger.source, "trigger added");
        Ok(trigger)
    }

    pub async fn update_trigger(&self, id: Uuid, update: TriggerUpdate) -> DomainResult<Trigger> {
        let mut triggers = self.triggers.write().await;
        let mut trigger = match triggers.get(&id) {
            Some(t) => t.clone(),
            None => self.repo.get(id).await?.ok_or(DomainError::TriggerNotFound(id))?,
        };
        trigger.apply(update)?;
        self.repo.update(&trigger).await?;
        triggers.insert(id, trigger.clone());
        tracing::info!(trigger_id = %id, enabled = trigger.enabled, "trigger updated");
        Ok(trigger)
    }

    /// Delete a trigger and its history.
    pub async fn remove_trigger(&self, id: Uuid) -> DomainResult<()> {
        let in_memory = self.triggers.write().await.remove(&id).is_some();
        let persisted = in_memory || self.repo.get(id).await?.is_some();
        if !persisted {
            return Err(DomainError::TriggerNotFound(id));
        }
        self.repo.delete(id).await?;
        tracing::info!(trigger_id = %id, "trigger removed");
        Ok(())
    }

    /// Triggers ordered by creation time, optionally scoped to a workspace.
    pub async fn list_triggers(&self, workspace_id: Option<&str>) -> Vec<Trigger> {
        let triggers = self.triggers.read().await;
        let mut list: Vec<Trigger> = triggers
            .values()
            .filter(|t| workspace_id.is_none_or(|ws| t.workspace_id == ws))
            .cloned()
            .collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.name.cmp(&b.name)));
        list
    }

    pub async fn get_trigger(&self, id: Uuid) -> Option<Trigger> {
        self.triggers.read().await.get(&id).cloned()
    }

    /// Newest-first fire history, capped at the retention limit.
    pub async fn get_history(&self, id: Uuid, limit: usize) -> DomainResult<Vec<TriggerHistoryEntry>> {
        self.repo.history(id, limit.min(self.history_limit)).await
    }

    /// Evaluate an event against every enabled trigger for its source and fire
    /// the matches. Returns the history entries recorded, one per firing.
    pub async fn evaluate_event(&self, event: &TriggerEvent) -> Vec<TriggerHistoryEntry> {
        if !self.is_running() {
            tracing::debug!(source = %event.source, "trigger engine stopped; ignoring event");
            return Vec::new();
        }

        let now = Utc::now();
        let fired: Vec<Trigger> = {
            let mut triggers = self.triggers.write().await;
            let mut candidates: Vec<&mut Trigger> = triggers
                .values_mut()
                .filter(|t| t.enabled && t.source == event.source)
                .collect();
            candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));

            let mut fired = Vec::new();
            for trigger in candidates {
                if !trigger.cooldown_elapsed(now) {
                    tracing::debug!(trigger_id = %trigger.id, "trigger in cooldown");
                    continue;
                }
                match self.evaluator.evaluate(event, &trigger.conditions, trigger.condition_logic) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(e) => {
                        tracing::warn!(trigger_id = %trigger.id, name = %trigger.name, error = %e, "condition evaluation failed");
                        continue;
                    }
                }
                trigger.mark_fired(now);
                fired.push(trigger.clone());
            }
            fired
        };

        let mut entries = Vec::with_capacity(fired.len());
        for trigger in &fired {
            entries.push(self.fire_trigger(trigger, event).await);
        }
        entries
    }

    async fn fire_trigger(&self, trigger: &Trigger, event: &TriggerEvent) -> TriggerHistoryEntry {
        let fired_at = trigger.last_fired_at.unwrap_or_else(Utc::now);
        if let Err(e) = self.repo.update_fire_state(trigger.id, fired_at, trigger.fire_count).await {
            tracing::warn!(trigger_id = %trigger.id, error = %e, "failed to persist trigger fire state");
        }

        tracing::info!(trigger_id = %trigger.id, name = %trigger.name, action = trigger.action.kind(), fire_count = trigger.fire_count, "trigger fired");

        let (action_result, task_id) = match self.dispatch(trigger, event).await {
            Ok(task_id) => (trigger.action.success_tag().to_string(), task_id),
            Err(e) => {
                tracing::warn!(trigger_id = %trigger.id, error = %e, "trigger action failed");
                (format!("error: {e}"), None)
            }
        };

        let entry = TriggerHistoryEntry {
            id: Uuid::new_v4(),
            trigger_id: trigger.id,
            fired_at,
            event_data: event.fields.clone(),
            action_result,
            task_id,
        };
        if let Err(e) = self.repo.append_history(&entry, self.history_limit).await {
            tracing::warn!(trigger_id = %trigger.id, error = %e, "failed to record trigger history");
        }
        entry
    }

    /// Run the trigger's action. Returns the created task id for `create_task`.
    async fn dispatch(&self, trigger: &Trigger, event: &TriggerEvent) -> DomainResult<Option<String>> {
        match &trigger.action {
            TriggerAction::CreateTask {
                title,
                prompt,
                workspace_id,
            } => {
                let workspace = workspace_id
                    .as_deref()
                    .filter(|ws| !ws.trim().is_empty())
                    .or_else(|| Some(trigger.workspace_id.as_str()).filter(|ws| !ws.trim().is_empty()));

                let mut action = AgentAction::new(substitute_template(prompt, event))
                    .with_title(substitute_template(title, event));
                if let Some(ws) = workspace {
                    action = action.with_workspace(ws);
                }
                let options = CreateTaskOptions::default()
                    .with_temp_workspace(TempWorkspaceKey::new(TRIGGER_TEMP_SCOPE, trigger.id.to_string()));

                let outcome = self.ingress.create_task_from_agent_action(&action, &options).await?;
                Ok(Some(outcome.task_id))
            }
            TriggerAction::SendMessage {
                channel_type,
                channel_id,
                message,
            } => {
                let delivery = self
                    .delivery
                    .as_ref()
                    .ok_or_else(|| DomainError::DependencyMissing("no channel delivery configured".to_string()))?;
                delivery
                    .send_message(channel_type, channel_id, &substitute_template(message, event))
                    .await?;
                Ok(None)
            }
            TriggerAction::WakeAgent { agent_role_id, prompt } => {
                let waker = self
                    .waker
                    .as_ref()
                    .ok_or_else(|| DomainError::DependencyMissing("no agent waker configured".to_string()))?;
                waker.wake_agent(agent_role_id, &substitute_template(prompt, event)).await?;
                Ok(None)
            }
        }
    }
}

/// Build an event from `key=value` pairs, parsing values as JSON when they parse.
pub fn event_from_pairs<'a>(source: &str, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> TriggerEvent {
    pairs.into_iter().fold(TriggerEvent::new(source), |event, (k, v)| {
        let value = serde_json::from_str::<Value>(v).unwrap_or_else(|_| Value::String(v.to_string()));
        event.with_field(k, value)
    })
}
