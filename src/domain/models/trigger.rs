//! Trigger rules, the events they listen to and their firing history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Default minimum time between two firings of the same trigger.
pub const DEFAULT_COOLDOWN_MS: u64 = 60_000;

/// Maximum number of history entries retained per trigger.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

// ---------------------------------------------------------------------------
// Conditions
// ---------------------------------------------------------------------------

/// How the clauses of a trigger combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionLogic {
    #[default]
    All,
    Any,
}

impl ConditionLogic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Any => "any",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Some(Self::All),
            "any" => Some(Self::Any),
            _ => None,
        }
    }
}

/// Comparison applied by a single condition clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Matches,
    Exists,
    NotExists,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl ConditionOperator {
    pub fn parse_str(s: &str) -> Option<Self> {
        let op = match s.trim().to_lowercase().as_str() {
            "equals" | "eq" | "==" => Self::Equals,
            "not_equals" | "ne" | "!=" => Self::NotEquals,
            "contains" => Self::Contains,
            "not_contains" => Self::NotContains,
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "matches" | "regex" => Self::Matches,
            "exists" => Self::Exists,
            "not_exists" => Self::NotExists,
            "gt" | ">" => Self::Gt,
            "gte" | ">=" => Self::Gte,
            "lt" | "<" => Self::Lt,
            "lte" | "<=" => Self::Lte,
            _ => return None,
        };
        Some(op)
    }
}

/// One field-match clause. Evaluated by a [`ConditionEvaluator`](crate::domain::ports::ConditionEvaluator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerCondition {
    /// Dotted path into the event field bag.
    pub field: String,
    pub op: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

impl TriggerCondition {
    pub fn new(field: impl Into<String>, op: ConditionOperator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// What happens when a trigger fires.
///
/// Stored as a tagged JSON object; unknown tags fail to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerAction {
    /// Create an agent task through the ingress coordinator.
    CreateTask {
        title: String,
        prompt: String,
        #[serde(default, rename = "workspaceId", alias = "workspace_id", skip_serializing_if = "Option::is_none")]
        workspace_id: Option<String>,
    },
    /// Deliver a message to an external channel.
    SendMessage {
        #[serde(rename = "channelType", alias = "channel_type")]
        channel_type: String,
        #[serde(rename = "channelId", alias = "channel_id")]
        channel_id: String,
        message: String,
    },
    /// Wake an agent role with a prompt.
    WakeAgent {
        #[serde(rename = "agentRoleId", alias = "agent_role_id")]
        agent_role_id: String,
        prompt: String,
    },
}

impl TriggerAction {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateTask { .. } => "create_task",
            Self::SendMessage { .. } => "send_message",
            Self::WakeAgent { .. } => "wake_agent",
        }
    }

    /// Outcome tag recorded in history when the action succeeds.
    pub fn success_tag(&self) -> &'static str {
        match self {
            Self::CreateTask { .. } => "task_created",
            Self::SendMessage { .. } => "message_sent",
            Self::WakeAgent { .. } => "agent_woken",
        }
    }

    fn validate(&self) -> DomainResult<()> {
        let missing = match self {
            Self::CreateTask { prompt, .. } if prompt.trim().is_empty() => Some("create_task.prompt"),
            Self::SendMessage { channel_id, .. } if channel_id.trim().is_empty() => {
                Some("send_message.channelId")
            }
            Self::SendMessage { message, .. } if message.trim().is_empty() => Some("send_message.message"),
            Self::WakeAgent { agent_role_id, .. } if agent_role_id.trim().is_empty() => {
                Some("wake_agent.agentRoleId")
            }
            _ => None,
        };
        match missing {
            Some(field) => Err(DomainError::ValidationFailed(format!("{field} cannot be empty"))),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

/// A persisted automation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    /// Which event producer this rule listens to.
    pub source: String,
    pub conditions: Vec<TriggerCondition>,
    pub condition_logic: ConditionLogic,
    pub action: TriggerAction,
    pub workspace_id: String,
    pub cooldown_ms: u64,
    pub last_fired_at: Option<DateTime<Utc>>,
    pub fire_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trigger {
    /// Build a new trigger from validated input.
    pub fn from_new(input: NewTrigger) -> DomainResult<Self> {
        input.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            name: input.name.trim().to_string(),
            description: input.description.filter(|d| !d.trim().is_empty()),
            enabled: input.enabled,
            source: input.source.trim().to_string(),
            conditions: input.conditions,
            condition_logic: input.condition_logic,
            action: input.action,
            workspace_id: input.workspace_id,
            cooldown_ms: input.cooldown_ms.unwrap_or(DEFAULT_COOLDOWN_MS),
            last_fired_at: None,
            fire_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether the cooldown window since the last firing has elapsed at `now`.
    pub fn cooldown_elapsed(&self, now: DateTime<Utc>) -> bool {
        match self.last_fired_at {
            None => true,
            Some(last) => {
                let elapsed = now.signed_duration_since(last).num_milliseconds();
                elapsed < 0 || elapsed as u64 >= self.cooldown_ms
            }
        }
    }

    /// Record a firing at `now`. `fire_count` only increases and
    /// `last_fired_at` never moves backwards.
    pub fn mark_fired(&mut self, now: DateTime<Utc>) {
        let stamp = match self.last_fired_at {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_fired_at = Some(stamp);
        self.fire_count = self.fire_count.saturating_add(1);
    }

    /// Apply a partial update, leaving fire bookkeeping untouched.
    pub fn apply(&mut self, update: TriggerUpdate) -> DomainResult<()> {
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(DomainError::ValidationFailed("Trigger name cannot be empty".to_string()));
            }
            self.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = description.filter(|d| !d.trim().is_empty());
        }
        if let Some(enabled) = update.enabled {
            self.enabled = enabled;
        }
        if let Some(source) = update.source {
            if source.trim().is_empty() {
                return Err(DomainError::ValidationFailed("Trigger source cannot be empty".to_string()));
            }
            self.source = source.trim().to_string();
        }
        if let Some(conditions) = update.conditions {
            self.conditions = conditions;
        }
        if let Some(logic) = update.condition_logic {
            self.condition_logic = logic;
        }
        if let Some(action) = update.action {
            action.validate()?;
            self.action = action;
        }
        if let Some(workspace_id) = update.workspace_id {
            self.workspace_id = workspace_id;
        }
        if let Some(cooldown_ms) = update.cooldown_ms {
            self.cooldown_ms = cooldown_ms;
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Input for creating a trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrigger {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub source: String,
    #[serde(default)]
    pub conditions: Vec<TriggerCondition>,
    #[serde(default)]
    pub condition_logic: ConditionLogic,
    pub action: TriggerAction,
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default)]
    pub cooldown_ms: Option<u64>,
}

const fn default_enabled() -> bool {
    true
}

impl NewTrigger {
    pub fn new(name: impl Into<String>, source: impl Into<String>, action: TriggerAction) -> Self {
        Self {
            name: name.into(),
            description: None,
            enabled: true,
            source: source.into(),
            conditions: Vec::new(),
            condition_logic: ConditionLogic::All,
            action,
            workspace_id: String::new(),
            cooldown_ms: None,
        }
    }

    pub fn with_condition(mut self, condition: TriggerCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_logic(mut self, logic: ConditionLogic) -> Self {
        self.condition_logic = logic;
        self
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = workspace_id.into();
        self
    }

    pub fn with_cooldown_ms(mut self, cooldown_ms: u64) -> Self {
        self.cooldown_ms = Some(cooldown_ms);
        self
    }

    fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::ValidationFailed("Trigger name cannot be empty".to_string()));
        }
        if self.source.trim().is_empty() {
            return Err(DomainError::ValidationFailed("Trigger source cannot be empty".to_string()));
        }
        self.action.validate()
    }
}

/// Partial update for an existing trigger. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub enabled: Option<bool>,
    pub source: Option<String>,
    pub conditions: Option<Vec<TriggerCondition>>,
    pub condition_logic: Option<ConditionLogic>,
    pub action: Option<TriggerAction>,
    pub workspace_id: Option<String>,
    pub cooldown_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Events and history
// ---------------------------------------------------------------------------

/// An inbound event. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    pub source: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl TriggerEvent {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Resolve a dotted path (`payload.from.address`) against the field bag.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.fields.get(first)?;
        for part in parts {
            current = match current {
                Value::Object(map) => map.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }
}

/// Append-only record of one firing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerHistoryEntry {
    pub id: Uuid,
    pub trigger_id: Uuid,
    pub fired_at: DateTime<Utc>,
    pub event_data: Map<String, Value>,
    /// Success tag (`task_created`, `message_sent`, `agent_woken`) or `error: <message>`.
    pub action_result: String,
    pub task_id: Option<String>,
}

impl TriggerHistoryEntry {
    pub fn is_error(&self) -> bool {
        self.action_result.starts_with("error:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_task_action() -> TriggerAction {
        TriggerAction::CreateTask {
            title: "Invoice {{subject}}".to_string(),
            prompt: "Handle {{subject}}".to_string(),
            workspace_id: None,
        }
    }

    #[test]
    fn test_action_round_trips_with_camel_case_tags() {
        let action = TriggerAction::SendMessage {
            channel_type: "slack".to_string(),
            channel_id: "C123".to_string(),
            message: "hi".to_string(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "send_message");
        assert_eq!(json["channelId"], "C123");

        let parsed: TriggerAction = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, action);
    }

    #[test]
    fn test_unknown_action_tag_is_rejected() {
        let result: Result<TriggerAction, _> =
            serde_json::from_value(json!({"type": "launch_rocket", "target": "moon"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_new_trigger_requires_name_and_source() {
        let err = Trigger::from_new(NewTrigger::new("  ", "gmail", create_task_action())).unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));

        let err = Trigger::from_new(NewTrigger::new("invoices", "", create_task_action())).unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[test]
    fn test_new_trigger_defaults_cooldown() {
        let trigger = Trigger::from_new(NewTrigger::new("invoices", "gmail", create_task_action())).unwrap();
        assert_eq!(trigger.cooldown_ms, DEFAULT_COOLDOWN_MS);
        assert_eq!(trigger.fire_count, 0);
        assert!(trigger.last_fired_at.is_none());
    }

    #[test]
    fn test_mark_fired_never_moves_backwards() {
        let mut trigger = Trigger::from_new(NewTrigger::new("t", "gmail", create_task_action())).unwrap();
        let later = Utc::now();
        let earlier = later - chrono::Duration::seconds(30);

        trigger.mark_fired(later);
        trigger.mark_fired(earlier);

        assert_eq!(trigger.fire_count, 2);
        assert_eq!(trigger.last_fired_at, Some(later));
    }

    #[test]
    fn test_cooldown_elapsed() {
        let mut trigger = Trigger::from_new(
            NewTrigger::new("t", "gmail", create_task_action()).with_cooldown_ms(1_000),
        )
        .unwrap();
        let now = Utc::now();
        assert!(trigger.cooldown_elapsed(now));

        trigger.mark_fired(now);
        assert!(!trigger.cooldown_elapsed(now + chrono::Duration::milliseconds(500)));
        assert!(trigger.cooldown_elapsed(now + chrono::Duration::milliseconds(1_000)));
    }

    #[test]
    fn test_apply_update_keeps_fire_state() {
        let mut trigger = Trigger::from_new(NewTrigger::new("t", "gmail", create_task_action())).unwrap();
        trigger.mark_fired(Utc::now());

        trigger
            .apply(TriggerUpdate {
                enabled: Some(false),
                cooldown_ms: Some(5),
                ..Default::default()
            })
            .unwrap();

        assert!(!trigger.enabled);
        assert_eq!(trigger.cooldown_ms, 5);
        assert_eq!(trigger.fire_count, 1);
    }

    #[test]
    fn test_event_lookup_dotted_path() {
        let event = TriggerEvent::new("gmail")
            .with_field("from", json!({"address": "billing@example.com"}))
            .with_field("labels", json!(["inbox", "finance"]));

        assert_eq!(event.lookup("from.address"), Some(&json!("billing@example.com")));
        assert_eq!(event.lookup("labels.1"), Some(&json!("finance")));
        assert_eq!(event.lookup("from.name"), None);
    }
}
