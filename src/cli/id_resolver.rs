//! Short ID prefix resolution for trigger commands.
//!
//! Any unique prefix of a trigger UUID is accepted, similar to git short hashes.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use uuid::Uuid;

const TRIGGER_QUERY: &str = "SELECT id FROM event_triggers WHERE id LIKE ? ORDER BY id LIMIT 10";

fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        bail!("ID prefix must not be empty");
    }
    if !prefix.chars().all(|c| c.is_ascii_hexdigit() || c == '-') {
        bail!("Invalid ID prefix '{prefix}': must contain only hex characters and dashes");
    }
    Ok(())
}

/// Resolve a trigger ID prefix to a full UUID.
pub async fn resolve_trigger_id(pool: &SqlitePool, prefix: &str) -> Result<Uuid> {
    if let Ok(uuid) = Uuid::parse_str(prefix) {
        return Ok(uuid);
    }
    validate_prefix(prefix)?;

    let rows: Vec<(String,)> = sqlx::query_as(TRIGGER_QUERY)
        .bind(format!("{}%", prefix.to_lowercase()))
        .fetch_all(pool)
        .await?;

    match rows.as_slice() {
        [] => bail!("No trigger found matching prefix '{prefix}'"),
        [(id,)] => Ok(Uuid::parse_str(id)?),
        many => {
            let candidates: Vec<&str> = many.iter().map(|(id,)| id.as_str()).collect();
            bail!(
                "Ambiguous trigger prefix '{prefix}' matches {} triggers: {}",
                candidates.len(),
                candidates.join(", ")
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteTriggerRepository};
    use crate::domain::models::{NewTrigger, Trigger, TriggerAction};
    use crate::domain::ports::TriggerRepository;

    async fn seeded() -> (SqlitePool, Trigger) {
        let pool = create_migrated_test_pool().await.unwrap();
        let trigger = Trigger::from_new(NewTrigger::new(
            "t",
            "gmail",
            TriggerAction::WakeAgent {
                agent_role_id: "ops".to_string(),
                prompt: "check".to_string(),
            },
        ))
        .unwrap();
        SqliteTriggerRepository::new(pool.clone()).create(&trigger).await.unwrap();
        (pool, trigger)
    }

    #[tokio::test]
    async fn test_resolves_unique_prefix() {
        let (pool, trigger) = seeded().await;
        let prefix = &trigger.id.to_string()[..8];
        assert_eq!(resolve_trigger_id(&pool, prefix).await.unwrap(), trigger.id);
        assert_eq!(resolve_trigger_id(&pool, &trigger.id.to_string()).await.unwrap(), trigger.id);
    }

    #[tokio::test]
    async fn test_rejects_bad_or_unknown_prefix() {
        let (pool, trigger) = seeded().await;
        assert!(resolve_trigger_id(&pool, "not-hex!").await.is_err());
        let other = if trigger.id.to_string().starts_with('0') { "1" } else { "0" };
        assert!(resolve_trigger_id(&pool, &format!("{other}{other}{other}")).await.is_err());
    }
}
