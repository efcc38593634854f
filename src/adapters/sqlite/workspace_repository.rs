//! SQLite implementation of the WorkspaceRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::PathBuf;

use crate::adapters::sqlite::{format_datetime, parse_datetime};
use crate::domain::errors::DomainResult;
use crate::domain::models::{Workspace, WorkspacePermissions};
use crate::domain::ports::WorkspaceRepository;

#[derive(Clone)]
pub struct SqliteWorkspaceRepository {
    pool: SqlitePool,
}

impl SqliteWorkspaceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WorkspaceRow {
    id: String,
    name: String,
    path: String,
    is_temp: i64,
    permissions: String,
    created_at: String,
    last_used_at: String,
}

fn row_to_workspace(row: WorkspaceRow) -> DomainResult<Workspace> {
    let permissions: WorkspacePermissions = serde_json::from_str(&row.permissions)?;
    Ok(Workspace {
        id: row.id,
        name: row.name,
        path: PathBuf::from(row.path),
        is_temp: row.is_temp != 0,
        permissions,
        created_at: parse_datetime(&row.created_at)?,
        last_used_at: parse_datetime(&row.last_used_at)?,
    })
}

#[async_trait]
impl WorkspaceRepository for SqliteWorkspaceRepository {
    async fn upsert(&self, workspace: &Workspace) -> DomainResult<()> {
        let permissions = serde_json::to_string(&workspace.permissions)?;

        sqlx::query(
            r#"INSERT INTO workspaces (id, name, path, is_temp, permissions, created_at, last_used_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   path = excluded.path,
                   permissions = excluded.permissions,
                   last_used_at = excluded.last_used_at"#,
        )
        .bind(&workspace.id)
        .bind(&workspace.name)
        .bind(workspace.path.to_string_lossy().into_owned())
        .bind(i64::from(workspace.is_temp))
        .bind(&permissions)
        .bind(format_datetime(workspace.created_at))
        .bind(format_datetime(workspace.last_used_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: &str) -> DomainResult<Option<Workspace>> {
        let row: Option<WorkspaceRow> = sqlx::query_as("SELECT * FROM workspaces WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_workspace).transpose()
    }

    async fn list_temp(&self) -> DomainResult<Vec<Workspace>> {
        let rows: Vec<WorkspaceRow> =
            sqlx::query_as("SELECT * FROM workspaces WHERE is_temp = 1 ORDER BY last_used_at")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(row_to_workspace).collect()
    }

    async fn delete(&self, id: &str) -> DomainResult<()> {
        sqlx::query("DELETE FROM workspaces WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
