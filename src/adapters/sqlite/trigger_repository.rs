//! SQLite implementation of the TriggerRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{ConditionLogic, Trigger, TriggerAction, TriggerCondition, TriggerHistoryEntry};
use crate::domain::ports::TriggerRepository;

#[derive(Clone)]
pub struct SqliteTriggerRepository {
    pool: SqlitePool,
}

impl SqliteTriggerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TriggerRow {
    id: String,
    name: String,
    description: Option<String>,
    enabled: i64,
    source: String,
    conditions: String,
    condition_logic: String,
    action: String,
    workspace_id: String,
    cooldown_ms: i64,
    last_fired_at: Option<String>,
    fire_count: i64,
    created_at: String,
    updated_at: String,
}

fn row_to_trigger(row: TriggerRow) -> DomainResult<Trigger> {
    let conditions: Vec<TriggerCondition> = serde_json::from_str(&row.conditions)?;
    let action: TriggerAction = serde_json::from_str(&row.action)?;
    let condition_logic = ConditionLogic::parse_str(&row.condition_logic).ok_or_else(|| {
        DomainError::SerializationError(format!("Unknown condition logic: {}", row.condition_logic))
    })?;

    Ok(Trigger {
        id: parse_uuid(&row.id)?,
        name: row.name,
        description: row.description,
        enabled: row.enabled != 0,
        source: row.source,
        conditions,
        condition_logic,
        action,
        workspace_id: row.workspace_id,
        cooldown_ms: u64::try_from(row.cooldown_ms).unwrap_or(0),
        last_fired_at: parse_optional_datetime(row.last_fired_at)?,
        fire_count: u64::try_from(row.fire_count).unwrap_or(0),
        created_at: parse_datetime(&row.created_at)?,
        updated_at: parse_datetime(&row.updated_at)?,
    })
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: String,
    trigger_id: String,
    fired_at: String,
    event_data: String,
    action_result: String,
    task_id: Option<String>,
}

fn row_to_history(row: HistoryRow) -> DomainResult<TriggerHistoryEntry> {
    let event_data: Map<String, Value> = serde_json::from_str(&row.event_data)?;
    Ok(TriggerHistoryEntry {
        id: parse_uuid(&row.id)?,
        trigger_id: parse_uuid(&row.trigger_id)?,
        fired_at: parse_datetime(&row.fired_at)?,
        event_data,
        action_result: row.action_result,
        task_id: row.task_id,
    })
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl TriggerRepository for SqliteTriggerRepository {
    async fn create(&self, trigger: &Trigger) -> DomainResult<()> {
        let conditions = serde_json::to_string(&trigger.conditions)?;
        let action = serde_json::to_string(&trigger.action)?;

        sqlx::query(
            r#"INSERT INTO event_triggers
               (id, name, description, enabled, source, conditions, condition_logic, action,
                workspace_id, cooldown_ms, last_fired_at, fire_count, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(trigger.id.to_string())
        .bind(&trigger.name)
        .bind(&trigger.description)
        .bind(i64::from(trigger.enabled))
        .bind(&trigger.source)
        .bind(&conditions)
        .bind(trigger.condition_logic.as_str())
        .bind(&action)
        .bind(&trigger.workspace_id)
        .bind(to_i64(trigger.cooldown_ms))
        .bind(trigger.last_fired_at.map(format_datetime))
        .bind(to_i64(trigger.fire_count))
        .bind(format_datetime(trigger.created_at))
        .bind(format_datetime(trigger.updated_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Trigger>> {
        let row: Option<TriggerRow> = sqlx::query_as("SELECT * FROM event_triggers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_trigger).transpose()
    }

    async fn update(&self, trigger: &Trigger) -> DomainResult<()> {
        let conditions = serde_json::to_string(&trigger.conditions)?;
        let action = serde_json::to_string(&trigger.action)?;

        let result = sqlx::query(
            r#"UPDATE event_triggers SET
               name = ?, description = ?, enabled = ?, source = ?,
               conditions = ?, condition_logic = ?, action = ?,
               workspace_id = ?, cooldown_ms = ?,
               last_fired_at = ?, fire_count = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&trigger.name)
        .bind(&trigger.description)
        .bind(i64::from(trigger.enabled))
        .bind(&trigger.source)
        .bind(&conditions)
        .bind(trigger.condition_logic.as_str())
        .bind(&action)
        .bind(&trigger.workspace_id)
        .bind(to_i64(trigger.cooldown_ms))
        .bind(trigger.last_fired_at.map(format_datetime))
        .bind(to_i64(trigger.fire_count))
        .bind(format_datetime(trigger.updated_at))
        .bind(trigger.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TriggerNotFound(trigger.id));
        }
        Ok(())
    }

    async fn update_fire_state(
        &self,
        id: Uuid,
        last_fired_at: DateTime<Utc>,
        fire_count: u64,
    ) -> DomainResult<()> {
        // Saves may land out of order; both columns only move forward.
        // Fixed-width RFC3339 `Z` strings compare in time order.
        sqlx::query(
            r#"UPDATE event_triggers SET
               last_fired_at = MAX(COALESCE(last_fired_at, ''), ?),
               fire_count = MAX(fire_count, ?)
               WHERE id = ?"#,
        )
        .bind(format_datetime(last_fired_at))
        .bind(to_i64(fire_count))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM event_trigger_history WHERE trigger_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM event_triggers WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self, workspace_id: Option<&str>) -> DomainResult<Vec<Trigger>> {
        let rows: Vec<TriggerRow> = match workspace_id {
            Some(ws) => {
                sqlx::query_as("SELECT * FROM event_triggers WHERE workspace_id = ? ORDER BY created_at, name")
                    .bind(ws)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM event_triggers ORDER BY created_at, name")
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut triggers = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id.clone();
            match row_to_trigger(row) {
                Ok(trigger) => triggers.push(trigger),
                Err(e) => tracing::warn!(trigger_id = %id, error = %e, "skipping malformed trigger row"),
            }
        }
        Ok(triggers)
    }

    async fn append_history(&self, entry: &TriggerHistoryEntry, keep: usize) -> DomainResult<()> {
        let event_data = serde_json::to_string(&entry.event_data)?;
        let trigger_id = entry.trigger_id.to_string();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO event_trigger_history
               (id, trigger_id, fired_at, event_data, action_result, task_id)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(&trigger_id)
        .bind(format_datetime(entry.fired_at))
        .bind(&event_data)
        .bind(&entry.action_result)
        .bind(&entry.task_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"DELETE FROM event_trigger_history
               WHERE trigger_id = ?
                 AND id NOT IN (
                     SELECT id FROM event_trigger_history
                     WHERE trigger_id = ?
                     ORDER BY fired_at DESC, rowid DESC
                     LIMIT ?
                 )"#,
        )
        .bind(&trigger_id)
        .bind(&trigger_id)
        .bind(i64::try_from(keep).unwrap_or(i64::MAX))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(())
    }

    async fn history(&self, trigger_id: Uuid, limit: usize) -> DomainResult<Vec<TriggerHistoryEntry>> {
        let rows: Vec<HistoryRow> = sqlx::query_as(
            r#"SELECT id, trigger_id, fired_at, event_data, action_result, task_id
               FROM event_trigger_history
               WHERE trigger_id = ?
               ORDER BY fired_at DESC, rowid DESC
               LIMIT ?"#,
        )
        .bind(trigger_id.to_string())
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_history).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;
    use crate::domain::models::{ConditionOperator, NewTrigger};
    use serde_json::json;

    async fn setup() -> SqliteTriggerRepository {
        let pool = create_migrated_test_pool().await.unwrap();
        SqliteTriggerRepository::new(pool)
    }

    fn invoice_trigger() -> Trigger {
        Trigger::from_new(
            NewTrigger::new(
                "invoices",
                "gmail",
                TriggerAction::CreateTask {
                    title: "Invoice".to_string(),
                    prompt: "Handle {{subject}}".to_string(),
                    workspace_id: None,
                },
            )
            .with_condition(TriggerCondition::new("subject", ConditionOperator::Contains, "invoice"))
            .with_workspace("ws-1"),
        )
        .unwrap()
    }

    fn history_entry(trigger_id: Uuid, n: i64) -> TriggerHistoryEntry {
        TriggerHistoryEntry {
            id: Uuid::new_v4(),
            trigger_id,
            fired_at: Utc::now() + chrono::Duration::milliseconds(n),
            event_data: json!({"n": n}).as_object().cloned().unwrap(),
            action_result: "task_created".to_string(),
            task_id: Some(format!("task-{n}")),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_trigger() {
        let repo = setup().await;
        let trigger = invoice_trigger();
        repo.create(&trigger).await.unwrap();

        let loaded = repo.get(trigger.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "invoices");
        assert_eq!(loaded.conditions, trigger.conditions);
        assert_eq!(loaded.action, trigger.action);
        assert_eq!(loaded.workspace_id, "ws-1");
        assert!(loaded.enabled);
    }

    #[tokio::test]
    async fn test_update_fire_state() {
        let repo = setup().await;
        let trigger = invoice_trigger();
        repo.create(&trigger).await.unwrap();

        let fired = Utc::now();
        repo.update_fire_state(trigger.id, fired, 3).await.unwrap();

        let loaded = repo.get(trigger.id).await.unwrap().unwrap();
        assert_eq!(loaded.fire_count, 3);
        assert_eq!(
            loaded.last_fired_at.map(|t| t.timestamp_millis()),
            Some(fired.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_stale_fire_state_does_not_move_backwards() {
        let repo = setup().await;
        let trigger = invoice_trigger();
        repo.create(&trigger).await.unwrap();

        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(250);
        repo.update_fire_state(trigger.id, later, 2).await.unwrap();
        repo.update_fire_state(trigger.id, earlier, 1).await.unwrap();

        let loaded = repo.get(trigger.id).await.unwrap().unwrap();
        assert_eq!(loaded.fire_count, 2);
        assert_eq!(
            loaded.last_fired_at.map(|t| t.timestamp_millis()),
            Some(later.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_update_missing_trigger_is_not_found() {
        let repo = setup().await;
        let err = repo.update(&invoice_trigger()).await.unwrap_err();
        assert!(matches!(err, DomainError::TriggerNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_workspace_and_skips_malformed_rows() {
        let repo = setup().await;
        let a = invoice_trigger();
        let mut b = invoice_trigger();
        b.workspace_id = "ws-2".to_string();
        repo.create(&a).await.unwrap();
        repo.create(&b).await.unwrap();

        sqlx::query(
            r#"INSERT INTO event_triggers (id, name, source, action, workspace_id, created_at, updated_at)
               VALUES ('bad', 'broken', 'gmail', '{"type":"nope"}', 'ws-1', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')"#,
        )
        .execute(&repo.pool)
        .await
        .unwrap();

        assert_eq!(repo.list(None).await.unwrap().len(), 2);
        let ws1 = repo.list(Some("ws-1")).await.unwrap();
        assert_eq!(ws1.len(), 1);
        assert_eq!(ws1[0].id, a.id);
    }

    #[tokio::test]
    async fn test_history_is_trimmed_and_newest_first() {
        let repo = setup().await;
        let trigger = invoice_trigger();
        repo.create(&trigger).await.unwrap();

        for n in 0..5 {
            repo.append_history(&history_entry(trigger.id, n), 3).await.unwrap();
        }

        let history = repo.history(trigger.id, 10).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].task_id.as_deref(), Some("task-4"));
        assert_eq!(history[2].task_id.as_deref(), Some("task-2"));
    }

    #[tokio::test]
    async fn test_delete_removes_history() {
        let repo = setup().await;
        let trigger = invoice_trigger();
        repo.create(&trigger).await.unwrap();
        repo.append_history(&history_entry(trigger.id, 0), 50).await.unwrap();

        repo.delete(trigger.id).await.unwrap();

        assert!(repo.get(trigger.id).await.unwrap().is_none());
        assert!(repo.history(trigger.id, 10).await.unwrap().is_empty());
    }
}
