//! Local task queue: the default TaskCreator, persisting tasks for an
//! external executor to pick up.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::adapters::sqlite::{format_datetime, parse_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{CreatedTask, TaskRequest, TaskStatus, TaskSummary};
use crate::domain::ports::TaskCreator;

#[derive(Clone)]
pub struct SqliteTaskQueue {
    pool: SqlitePool,
}

impl SqliteTaskQueue {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent tasks first, optionally only those in one workspace.
    pub async fn list(&self, workspace_id: Option<&str>, limit: usize) -> DomainResult<Vec<TaskSummary>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<TaskRow> = match workspace_id {
            Some(ws) => {
                sqlx::query_as(
                    "SELECT * FROM agent_tasks WHERE workspace_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
                )
                .bind(ws)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM agent_tasks ORDER BY created_at DESC, rowid DESC LIMIT ?")
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.into_iter().map(row_to_task).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: String,
    title: String,
    prompt: String,
    workspace_id: String,
    status: String,
    created_at: String,
}

fn row_to_task(row: TaskRow) -> DomainResult<TaskSummary> {
    let status = TaskStatus::parse_str(&row.status)
        .ok_or_else(|| DomainError::SerializationError(format!("Unknown task status: {}", row.status)))?;
    Ok(TaskSummary {
        id: row.id,
        title: row.title,
        prompt: row.prompt,
        workspace_id: row.workspace_id,
        status,
        created_at: parse_datetime(&row.created_at)?,
    })
}

#[async_trait]
impl TaskCreator for SqliteTaskQueue {
    async fn create_task(&self, request: TaskRequest) -> DomainResult<CreatedTask> {
        let id = Uuid::new_v4().to_string();
        let now = format_datetime(Utc::now());

        sqlx::query(
            r#"INSERT INTO agent_tasks (id, title, prompt, workspace_id, status, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&id)
        .bind(&request.title)
        .bind(&request.prompt)
        .bind(&request.workspace_id)
        .bind(TaskStatus::Queued.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        tracing::debug!(task_id = %id, workspace_id = %request.workspace_id, "task queued");
        Ok(CreatedTask { id })
    }

    async fn cancel_task(&self, task_id: &str) -> DomainResult<()> {
        sqlx::query(
            "UPDATE agent_tasks SET status = ?, updated_at = ? WHERE id = ? AND status IN ('queued', 'running')",
        )
        .bind(TaskStatus::Cancelled.as_str())
        .bind(format_datetime(Utc::now()))
        .bind(task_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> DomainResult<Option<TaskSummary>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM agent_tasks WHERE id = ?")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_task).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::create_migrated_test_pool;

    fn request(workspace_id: &str) -> TaskRequest {
        TaskRequest {
            title: "Reply".to_string(),
            prompt: "Reply to the thread".to_string(),
            workspace_id: workspace_id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_then_cancel() {
        let queue = SqliteTaskQueue::new(create_migrated_test_pool().await.unwrap());
        let created = queue.create_task(request("ws")).await.unwrap();

        let task = queue.get_task(&created.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.workspace_id, "ws");

        queue.cancel_task(&created.id).await.unwrap();
        let task = queue.get_task(&created.id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_list_by_workspace() {
        let queue = SqliteTaskQueue::new(create_migrated_test_pool().await.unwrap());
        queue.create_task(request("a")).await.unwrap();
        queue.create_task(request("b")).await.unwrap();
        queue.create_task(request("a")).await.unwrap();

        assert_eq!(queue.list(Some("a"), 10).await.unwrap().len(), 2);
        assert_eq!(queue.list(None, 2).await.unwrap().len(), 2);
        assert!(queue.get_task("missing").await.unwrap().is_none());
    }
}
