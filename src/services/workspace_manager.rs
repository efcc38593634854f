//! Provisioning and pruning of per-key temp workspaces.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::errors::DomainResult;
use crate::domain::models::{TempWorkspaceKey, Workspace, WorkspacePermissions};
use crate::domain::ports::WorkspaceRepository;

/// Owns the temp workspace directories under one root.
///
/// A workspace is active while its in-memory lease or its stored
/// `last_used_at` is younger than the lease TTL. Active workspaces are never pruned.
pub struct TempWorkspaceManager {
    repo: Arc<dyn WorkspaceRepository>,
    root: PathBuf,
    lease_ttl: Duration,
    leases: RwLock<HashMap<String, DateTime<Utc>>>,
}

impl TempWorkspaceManager {
    pub fn new(repo: Arc<dyn WorkspaceRepository>, root: impl Into<PathBuf>, lease_ttl: Duration) -> Self {
        Self {
            repo,
            root: root.into(),
            lease_ttl,
            leases: RwLock::new(HashMap::new()),
        }
    }

    /// Create or reuse the workspace for `key`, touch its lease, then prune stale siblings.
    pub async fn provision(&self, key: &TempWorkspaceKey) -> DomainResult<Workspace> {
        let id = key.workspace_id();
        let path = self.root.join(&id);
        tokio::fs::create_dir_all(&path).await?;

        let now = Utc::now();
        let created_at = match self.repo.get(&id).await? {
            Some(existing) => existing.created_at,
            None => now,
        };

        let workspace = Workspace {
            id: id.clone(),
            name: key.display_name(),
            path,
            is_temp: true,
            permissions: WorkspacePermissions::temp_default(),
            created_at,
            last_used_at: now,
        };
        self.repo.upsert(&workspace).await?;
        self.touch(&id).await;

        match self.prune_stale(&id).await {
            Ok(pruned) if !pruned.is_empty() => {
                tracing::info!(workspace_id = %id, pruned = pruned.len(), "pruned stale temp workspaces");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(workspace_id = %id, error = %e, "temp workspace pruning failed"),
        }

        Ok(workspace)
    }

    /// Mark a workspace as in use now.
    pub async fn touch(&self, workspace_id: &str) {
        self.leases.write().await.insert(workspace_id.to_string(), Utc::now());
    }

    pub async fn is_leased(&self, workspace_id: &str, now: DateTime<Utc>) -> bool {
        self.leases
            .read()
            .await
            .get(workspace_id)
            .is_some_and(|touched| self.within_ttl(*touched, now))
    }

    fn within_ttl(&self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(at);
        age.to_std().ok().is_none_or(|age| age < self.lease_ttl)
    }

    /// Delete temp workspaces other than `keep` that are no longer active.
    /// Returns the ids removed.
    pub async fn prune_stale(&self, keep: &str) -> DomainResult<Vec<String>> {
        let now = Utc::now();
        let mut pruned = Vec::new();

        for workspace in self.repo.list_temp().await? {
            if workspace.id == keep
                || self.is_leased(&workspace.id, now).await
                || self.within_ttl(workspace.last_used_at, now)
            {
                continue;
            }

            if workspace.path.starts_with(&self.root) {
                match tokio::fs::remove_dir_all(&workspace.path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(workspace_id = %workspace.id, error = %e, "failed to remove temp workspace directory");
                        continue;
                    }
                }
            } else {
                tracing::warn!(workspace_id = %workspace.id, path = %workspace.path.display(), "temp workspace outside root; keeping directory");
            }

            self.repo.delete(&workspace.id).await?;
            self.leases.write().await.remove(&workspace.id);
            pruned.push(workspace.id);
        }

        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteWorkspaceRepository};
    use std::path::Path;

    async fn setup(root: &Path, ttl: Duration) -> (TempWorkspaceManager, Arc<SqliteWorkspaceRepository>) {
        let repo = Arc::new(SqliteWorkspaceRepository::new(create_migrated_test_pool().await.unwrap()));
        (TempWorkspaceManager::new(repo.clone(), root, ttl), repo)
    }

    #[tokio::test]
    async fn test_provision_reuses_workspace_for_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, repo) = setup(dir.path(), Duration::from_secs(3600)).await;
        let key = TempWorkspaceKey::new("xmention", "Alice");

        let first = manager.provision(&key).await.unwrap();
        let second = manager.provision(&key).await.unwrap();

        assert_eq!(first.id, "temp-xmention-alice");
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at.timestamp_millis(), second.created_at.timestamp_millis());
        assert!(first.path.is_dir());
        assert!(!second.permissions.shell);
        assert_eq!(repo.list_temp().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_removes_only_inactive_workspaces() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, repo) = setup(dir.path(), Duration::from_secs(3600)).await;

        let stale_path = dir.path().join("temp-hooks-stale");
        std::fs::create_dir_all(&stale_path).unwrap();
        let long_ago = Utc::now() - chrono::Duration::hours(48);
        repo.upsert(&Workspace {
            id: "temp-hooks-stale".to_string(),
            name: "stale".to_string(),
            path: stale_path.clone(),
            is_temp: true,
            permissions: WorkspacePermissions::temp_default(),
            created_at: long_ago,
            last_used_at: long_ago,
        })
        .await
        .unwrap();

        let kept = manager.provision(&TempWorkspaceKey::new("hooks", "fresh")).await.unwrap();

        let remaining: Vec<_> = repo.list_temp().await.unwrap().into_iter().map(|w| w.id).collect();
        assert_eq!(remaining, vec![kept.id]);
        assert!(!stale_path.exists());
    }

    #[tokio::test]
    async fn test_leased_workspace_survives_prune() {
        let dir = tempfile::tempdir().unwrap();
        let (manager, repo) = setup(dir.path(), Duration::from_secs(3600)).await;
        let long_ago = Utc::now() - chrono::Duration::hours(48);
        repo.upsert(&Workspace {
            id: "temp-hooks-old".to_string(),
            name: "old".to_string(),
            path: dir.path().join("temp-hooks-old"),
            is_temp: true,
            permissions: WorkspacePermissions::temp_default(),
            created_at: long_ago,
            last_used_at: long_ago,
        })
        .await
        .unwrap();
        manager.touch("temp-hooks-old").await;

        let pruned = manager.prune_stale("other").await.unwrap();
        assert!(pruned.is_empty());
    }
}
