//! SQLite implementation of the HookSessionRepository.
//!
//! Both the mapping and the lock rely on primary-key uniqueness:
//! `INSERT OR IGNORE` plus `rows_affected() == 1` decides the single winner.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;

use crate::adapters::sqlite::datetime_from_millis;
use crate::domain::errors::DomainResult;
use crate::domain::models::{normalize_session_key, HookSessionRecord, SessionLock};
use crate::domain::ports::HookSessionRepository;

#[derive(Clone)]
pub struct SqliteHookSessionRepository {
    pool: SqlitePool,
}

impl SqliteHookSessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HookSessionRow {
    session_key: String,
    task_id: String,
    created_at: i64,
}

#[derive(Debug, sqlx::FromRow)]
struct SessionLockRow {
    session_key: String,
    created_at: i64,
    expires_at: i64,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[async_trait]
impl HookSessionRepository for SqliteHookSessionRepository {
    async fn find_by_session_key(&self, key: &str) -> DomainResult<Option<HookSessionRecord>> {
        let Some(key) = normalize_session_key(key) else {
            return Ok(None);
        };

        let row: Option<HookSessionRow> =
            sqlx::query_as("SELECT session_key, task_id, created_at FROM hook_sessions WHERE session_key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|r| {
            Ok(HookSessionRecord {
                session_key: r.session_key,
                task_id: r.task_id,
                created_at: datetime_from_millis(r.created_at)?,
            })
        })
        .transpose()
    }

    async fn create(&self, key: &str, task_id: &str) -> DomainResult<bool> {
        let Some(key) = normalize_session_key(key) else {
            return Ok(false);
        };

        let result = sqlx::query(
            "INSERT OR IGNORE INTO hook_sessions (session_key, task_id, created_at) VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(task_id)
        .bind(now_ms())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn acquire_lock(&self, key: &str, ttl: Duration) -> DomainResult<bool> {
        let Some(key) = normalize_session_key(key) else {
            return Ok(false);
        };

        let now = now_ms();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);

        sqlx::query("DELETE FROM hook_session_locks WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO hook_session_locks (session_key, created_at, expires_at) VALUES (?, ?, ?)",
        )
        .bind(key)
        .bind(now)
        .bind(now.saturating_add(ttl_ms))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_lock(&self, key: &str) -> DomainResult<()> {
        let Some(key) = normalize_session_key(key) else {
            return Ok(());
        };

        sqlx::query("DELETE FROM hook_session_locks WHERE session_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_lock(&self, key: &str) -> DomainResult<Option<SessionLock>> {
        let Some(key) = normalize_session_key(key) else {
            return Ok(None);
        };

        let row: Option<SessionLockRow> = sqlx::query_as(
            "SELECT session_key, created_at, expires_at FROM hook_session_locks WHERE session_key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(now_ms())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(SessionLock {
                session_key: r.session_key,
                created_at: datetime_from_millis(r.created_at)?,
                expires_at: datetime_from_millis(r.expires_at)?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    async fn setup() -> SqliteHookSessionRepository {
        SqliteHookSessionRepository::new(create_migrated_test_pool().await.unwrap())
    }

    #[tokio::test]
    async fn test_first_mapping_wins() {
        let repo = setup().await;

        assert!(repo.create("xmention:1", "task-a").await.unwrap());
        assert!(!repo.create("xmention:1", "task-b").await.unwrap());

        let record = repo.find_by_session_key("  xmention:1 ").await.unwrap().unwrap();
        assert_eq!(record.task_id, "task-a");
    }

    #[tokio::test]
    async fn test_empty_key_is_noop() {
        let repo = setup().await;

        assert!(!repo.create("   ", "task-a").await.unwrap());
        assert!(!repo.acquire_lock("", Duration::from_secs(60)).await.unwrap());
        assert!(repo.find_by_session_key(" ").await.unwrap().is_none());
        repo.release_lock("").await.unwrap();
    }

    #[tokio::test]
    async fn test_lock_is_exclusive_until_released() {
        let repo = setup().await;
        let ttl = Duration::from_secs(60);

        assert!(repo.acquire_lock("k", ttl).await.unwrap());
        assert!(!repo.acquire_lock("k", ttl).await.unwrap());
        let lock = repo.find_lock(" k ").await.unwrap().unwrap();
        assert_eq!(lock.session_key, "k");
        assert!(lock.expires_at > lock.created_at);

        repo.release_lock("k").await.unwrap();
        repo.release_lock("k").await.unwrap();
        assert!(repo.find_lock("k").await.unwrap().is_none());

        assert!(repo.acquire_lock("k", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lock_is_reclaimed() {
        let repo = setup().await;

        assert!(repo.acquire_lock("k", Duration::from_millis(0)).await.unwrap());
        assert!(repo.find_lock("k").await.unwrap().is_none());
        assert!(repo.acquire_lock("k", Duration::from_secs(60)).await.unwrap());
    }
}
