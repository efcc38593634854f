//! Idempotent task ingress.
//!
//! At most one task is ever created per session key. Uniqueness comes from the
//! session store's insert-or-ignore mapping; the TTL lock only keeps concurrent
//! callers from doing redundant work. The loser of an insert race cancels the
//! task it created and reports the winner's task as a duplicate.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    normalize_session_key, AgentAction, CreateTaskOptions, HookSessionRecord, IngressConfig, IngressOutcome,
    TaskRequest, TempWorkspaceKey,
};
use crate::domain::ports::{HookSessionRepository, TaskCreator};
use crate::services::workspace_manager::TempWorkspaceManager;

/// Temp workspace scope used when the caller names neither a workspace nor a temp key.
pub const DEFAULT_TEMP_SCOPE: &str = "hooks";

/// Lock and wait timings for the idempotency protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngressSettings {
    pub lock_ttl: Duration,
    pub wait_poll_interval: Duration,
    pub wait_timeout: Duration,
}

impl Default for IngressSettings {
    fn default() -> Self {
        Self::from(&IngressConfig::default())
    }
}

impl From<&IngressConfig> for IngressSettings {
    fn from(config: &IngressConfig) -> Self {
        Self {
            lock_ttl: Duration::from_millis(config.lock_ttl_ms),
            wait_poll_interval: Duration::from_millis(config.wait_poll_interval_ms.max(1)),
            wait_timeout: Duration::from_millis(config.wait_timeout_ms),
        }
    }
}

pub struct IngressCoordinator {
    sessions: Arc<dyn HookSessionRepository>,
    tasks: Arc<dyn TaskCreator>,
    workspaces: Arc<TempWorkspaceManager>,
    settings: IngressSettings,
}

impl IngressCoordinator {
    pub fn new(
        sessions: Arc<dyn HookSessionRepository>,
        tasks: Arc<dyn TaskCreator>,
        workspaces: Arc<TempWorkspaceManager>,
        settings: IngressSettings,
    ) -> Self {
        Self {
            sessions,
            tasks,
            workspaces,
            settings,
        }
    }

    /// Create the task for `action`, or return the task an earlier call with the
    /// same session key already created.
    ///
    /// Fails with [`DomainError::ValidationFailed`] for an empty message or an
    /// empty session key, and with [`DomainError::SessionKeyBusy`] when another
    /// caller holds the key's lock for the whole wait window without publishing
    /// a mapping.
    pub async fn create_task_from_agent_action(
        &self,
        action: &AgentAction,
        options: &CreateTaskOptions,
    ) -> DomainResult<IngressOutcome> {
        if action.message.trim().is_empty() {
            return Err(DomainError::ValidationFailed("Task message cannot be empty".to_string()));
        }

        let session_key = match options.session_key.as_deref() {
            None => None,
            Some(raw) => Some(
                normalize_session_key(raw)
                    .ok_or_else(|| DomainError::ValidationFailed("Session key cannot be empty".to_string()))?,
            ),
        };

        let Some(key) = session_key else {
            return self.create_task(action, options, None).await;
        };

        if let Some(record) = self.sessions.find_by_session_key(key).await? {
            tracing::debug!(session_key = key, task_id = %record.task_id, "session key already mapped");
            return Ok(self.duplicate(record, action, options).await);
        }

        if self.sessions.acquire_lock(key, self.settings.lock_ttl).await? {
            return self.create_under_lock(key, action, options).await;
        }

        tracing::debug!(session_key = key, "session key locked elsewhere; waiting for mapping");
        let deadline = Instant::now() + self.settings.wait_timeout;
        while Instant::now() < deadline {
            tokio::time::sleep(self.settings.wait_poll_interval).await;
            if let Some(record) = self.sessions.find_by_session_key(key).await? {
                return Ok(self.duplicate(record, action, options).await);
            }
        }

        if self.sessions.acquire_lock(key, self.settings.lock_ttl).await? {
            return self.create_under_lock(key, action, options).await;
        }

        tracing::warn!(session_key = key, "session key still locked after wait window");
        Err(DomainError::SessionKeyBusy(key.to_string()))
    }

    /// Runs with the key's lock held and always releases it.
    async fn create_under_lock(
        &self,
        key: &str,
        action: &AgentAction,
        options: &CreateTaskOptions,
    ) -> DomainResult<IngressOutcome> {
        let result = self.create_once(key, action, options).await;
        if let Err(e) = self.sessions.release_lock(key).await {
            tracing::warn!(session_key = key, error = %e, "failed to release session lock");
        }
        result
    }

    async fn create_once(
        &self,
        key: &str,
        action: &AgentAction,
        options: &CreateTaskOptions,
    ) -> DomainResult<IngressOutcome> {
        if let Some(record) = self.sessions.find_by_session_key(key).await? {
            return Ok(self.duplicate(record, action, options).await);
        }

        let outcome = self.create_task(action, options, Some(key)).await?;

        let won = match self.sessions.create(key, &outcome.task_id).await {
            Ok(won) => won,
            Err(e) => {
                self.cancel_best_effort(&outcome.task_id).await;
                return Err(e);
            }
        };
        if won {
            return Ok(outcome);
        }

        tracing::warn!(session_key = key, task_id = %outcome.task_id, "lost session mapping race; cancelling duplicate task");
        self.cancel_best_effort(&outcome.task_id).await;
        match self.sessions.find_by_session_key(key).await? {
            Some(record) => Ok(self.duplicate(record, action, options).await),
            None => Err(DomainError::ExecutionFailed(format!(
                "Session mapping for '{key}' vanished after a lost insert"
            ))),
        }
    }

    async fn create_task(
        &self,
        action: &AgentAction,
        options: &CreateTaskOptions,
        session_key: Option<&str>,
    ) -> DomainResult<IngressOutcome> {
        let workspace_id = self.resolve_workspace(action, options, session_key).await?;
        let created = self
            .tasks
            .create_task(TaskRequest {
                title: action.resolved_title(),
                prompt: action.message.clone(),
                workspace_id: workspace_id.clone(),
            })
            .await?;

        tracing::info!(task_id = %created.id, workspace_id = %workspace_id, session_key = session_key.unwrap_or(""), "task created");
        Ok(IngressOutcome {
            task_id: created.id,
            workspace_id,
            duplicate: false,
        })
    }

    async fn resolve_workspace(
        &self,
        action: &AgentAction,
        options: &CreateTaskOptions,
        session_key: Option<&str>,
    ) -> DomainResult<String> {
        if let Some(ws) = explicit_workspace(action) {
            return Ok(ws.to_string());
        }
        let key = options.temp_workspace.clone().unwrap_or_else(|| {
            let discriminator = session_key.map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
            TempWorkspaceKey::new(DEFAULT_TEMP_SCOPE, discriminator)
        });
        Ok(self.workspaces.provision(&key).await?.id)
    }

    async fn duplicate(
        &self,
        record: HookSessionRecord,
        action: &AgentAction,
        options: &CreateTaskOptions,
    ) -> IngressOutcome {
        let from_task = match self.tasks.get_task(&record.task_id).await {
            Ok(task) => task.map(|t| t.workspace_id),
            Err(e) => {
                tracing::debug!(task_id = %record.task_id, error = %e, "could not look up duplicate task");
                None
            }
        };
        let workspace_id = from_task
            .or_else(|| explicit_workspace(action).map(str::to_string))
            .or_else(|| options.temp_workspace.as_ref().map(TempWorkspaceKey::workspace_id))
            .unwrap_or_default();

        IngressOutcome {
            task_id: record.task_id,
            workspace_id,
            duplicate: true,
        }
    }

    async fn cancel_best_effort(&self, task_id: &str) {
        if let Err(e) = self.tasks.cancel_task(task_id).await {
            tracing::warn!(task_id, error = %e, "failed to cancel duplicate task");
        }
    }
}

fn explicit_workspace(action: &AgentAction) -> Option<&str> {
    action.workspace_id.as_deref().map(str::trim).filter(|ws| !ws.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteHookSessionRepository, SqliteTaskQueue, SqliteWorkspaceRepository,
    };
    use crate::domain::models::TaskStatus;

    struct Harness {
        coordinator: IngressCoordinator,
        sessions: Arc<SqliteHookSessionRepository>,
        queue: Arc<SqliteTaskQueue>,
        _dir: tempfile::TempDir,
    }

    async fn harness(settings: IngressSettings) -> Harness {
        let pool = create_migrated_test_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let sessions = Arc::new(SqliteHookSessionRepository::new(pool.clone()));
        let queue = Arc::new(SqliteTaskQueue::new(pool.clone()));
        let workspaces = Arc::new(TempWorkspaceManager::new(
            Arc::new(SqliteWorkspaceRepository::new(pool)),
            dir.path(),
            Duration::from_secs(3600),
        ));
        Harness {
            coordinator: IngressCoordinator::new(sessions.clone(), queue.clone(), workspaces, settings),
            sessions,
            queue,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_empty_message_and_key_are_rejected() {
        let h = harness(IngressSettings::default()).await;

        let err = h
            .coordinator
            .create_task_from_agent_action(&AgentAction::new("   "), &CreateTaskOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));

        let err = h
            .coordinator
            .create_task_from_agent_action(&AgentAction::new("hi"), &CreateTaskOptions::default().with_session_key(" "))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::ValidationFailed(_)));
    }

    #[tokio::test]
    async fn test_without_session_key_every_call_creates() {
        let h = harness(IngressSettings::default()).await;
        let action = AgentAction::new("do it").with_workspace("main");

        let a = h.coordinator.create_task_from_agent_action(&action, &CreateTaskOptions::default()).await.unwrap();
        let b = h.coordinator.create_task_from_agent_action(&action, &CreateTaskOptions::default()).await.unwrap();

        assert_ne!(a.task_id, b.task_id);
        assert_eq!(a.workspace_id, "main");
        assert!(!a.duplicate && !b.duplicate);
    }

    #[tokio::test]
    async fn test_second_delivery_is_duplicate() {
        let h = harness(IngressSettings::default()).await;
        let options = CreateTaskOptions::default()
            .with_session_key("xmention:1")
            .with_temp_workspace(TempWorkspaceKey::new("xmention", "alice"));
        let action = AgentAction::new("launch");

        let first = h.coordinator.create_task_from_agent_action(&action, &options).await.unwrap();
        let second = h.coordinator.create_task_from_agent_action(&action, &options).await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.task_id, second.task_id);
        assert_eq!(first.workspace_id, "temp-xmention-alice");
        assert_eq!(second.workspace_id, "temp-xmention-alice");
        assert_eq!(h.queue.list(None, 10).await.unwrap().len(), 1);
        assert!(h.sessions.acquire_lock("xmention:1", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_busy_when_lock_held_and_no_mapping() {
        let h = harness(IngressSettings {
            lock_ttl: Duration::from_secs(60),
            wait_poll_interval: Duration::from_millis(10),
            wait_timeout: Duration::from_millis(50),
        })
        .await;
        assert!(h.sessions.acquire_lock("k", Duration::from_secs(60)).await.unwrap());

        let err = h
            .coordinator
            .create_task_from_agent_action(&AgentAction::new("x"), &CreateTaskOptions::default().with_session_key("k"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SessionKeyBusy(_)));
        assert!(h.queue.list(None, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_waiter_returns_mapping_published_by_holder() {
        let h = harness(IngressSettings {
            lock_ttl: Duration::from_secs(60),
            wait_poll_interval: Duration::from_millis(10),
            wait_timeout: Duration::from_secs(5),
        })
        .await;
        assert!(h.sessions.acquire_lock("k", Duration::from_secs(60)).await.unwrap());

        let sessions = h.sessions.clone();
        let publisher = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            sessions.create("k", "task-from-holder").await.unwrap();
            sessions.release_lock("k").await.unwrap();
        });

        let outcome = h
            .coordinator
            .create_task_from_agent_action(&AgentAction::new("x"), &CreateTaskOptions::default().with_session_key("k"))
            .await
            .unwrap();
        publisher.await.unwrap();

        assert!(outcome.duplicate);
        assert_eq!(outcome.task_id, "task-from-holder");
    }

    /// Hides existing mappings from the first `hidden` lookups, simulating a
    /// writer that committed between the re-check and the insert.
    struct LateMappingSessions {
        inner: SqliteHookSessionRepository,
        hidden: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl HookSessionRepository for LateMappingSessions {
        async fn find_by_session_key(&self, key: &str) -> DomainResult<Option<HookSessionRecord>> {
            use std::sync::atomic::Ordering;
            if self.hidden.load(Ordering::SeqCst) > 0 {
                self.hidden.fetch_sub(1, Ordering::SeqCst);
                return Ok(None);
            }
            self.inner.find_by_session_key(key).await
        }

        async fn create(&self, key: &str, task_id: &str) -> DomainResult<bool> {
            self.inner.create(key, task_id).await
        }

        async fn acquire_lock(&self, key: &str, ttl: Duration) -> DomainResult<bool> {
            self.inner.acquire_lock(key, ttl).await
        }

        async fn release_lock(&self, key: &str) -> DomainResult<()> {
            self.inner.release_lock(key).await
        }

        async fn find_lock(&self, key: &str) -> DomainResult<Option<crate::domain::models::SessionLock>> {
            self.inner.find_lock(key).await
        }
    }

    #[tokio::test]
    async fn test_lost_mapping_race_cancels_created_task() {
        let pool = create_migrated_test_pool().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let inner = SqliteHookSessionRepository::new(pool.clone());
        inner.create("k", "winner").await.unwrap();
        let sessions = Arc::new(LateMappingSessions {
            inner,
            hidden: std::sync::atomic::AtomicUsize::new(2),
        });
        let queue = Arc::new(SqliteTaskQueue::new(pool.clone()));
        let workspaces = Arc::new(TempWorkspaceManager::new(
            Arc::new(SqliteWorkspaceRepository::new(pool)),
            dir.path(),
            Duration::from_secs(3600),
        ));
        let coordinator = IngressCoordinator::new(sessions.clone(), queue.clone(), workspaces, IngressSettings::default());

        let outcome = coordinator
            .create_task_from_agent_action(
                &AgentAction::new("x").with_workspace("main"),
                &CreateTaskOptions::default().with_session_key("k"),
            )
            .await
            .unwrap();

        assert!(outcome.duplicate);
        assert_eq!(outcome.task_id, "winner");
        let tasks = queue.list(None, 10).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].status, TaskStatus::Cancelled);
        assert!(sessions.acquire_lock("k", Duration::from_secs(1)).await.unwrap());
    }
}
