//! Port to the agent task executor.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{CreatedTask, TaskRequest, TaskSummary};

/// Creates and cancels agent tasks. Execution itself happens elsewhere.
#[async_trait]
pub trait TaskCreator: Send + Sync {
    async fn create_task(&self, request: TaskRequest) -> DomainResult<CreatedTask>;

    /// Best-effort cancellation of a task that should not have been created.
    async fn cancel_task(&self, task_id: &str) -> DomainResult<()>;

    async fn get_task(&self, task_id: &str) -> DomainResult<Option<TaskSummary>>;
}
