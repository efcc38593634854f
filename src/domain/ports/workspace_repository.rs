//! Repository port for workspace rows.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::Workspace;

#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Insert, or on id conflict update name, path, last-used time and permissions.
    async fn upsert(&self, workspace: &Workspace) -> DomainResult<()>;

    async fn get(&self, id: &str) -> DomainResult<Option<Workspace>>;

    async fn list_temp(&self) -> DomainResult<Vec<Workspace>>;

    async fn delete(&self, id: &str) -> DomainResult<()>;
}
