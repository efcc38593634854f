//! Types exchanged with the task ingress coordinator and the task creator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::workspace::TempWorkspaceKey;

/// An inbound request to create an agent task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAction {
    /// Task title; derived from the message when absent.
    #[serde(default)]
    pub title: Option<String>,
    /// Task prompt. Must be non-empty after trimming.
    pub message: String,
    /// Target workspace. A temp workspace is provisioned when absent.
    #[serde(default)]
    pub workspace_id: Option<String>,
}

impl AgentAction {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            title: None,
            message: message.into(),
            workspace_id: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_workspace(mut self, workspace_id: impl Into<String>) -> Self {
        self.workspace_id = Some(workspace_id.into());
        self
    }

    /// Explicit title, or the first non-empty line of the message capped at 80 chars.
    pub fn resolved_title(&self) -> String {
        if let Some(title) = self.title.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        let first_line = self
            .message
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("Untitled task");
        truncate_chars(first_line, 80)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
        out.push_str("...");
        out
    }
}

/// Options controlling idempotency and workspace selection for one ingress call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTaskOptions {
    /// Idempotency key; at most one task is ever created per key.
    #[serde(default)]
    pub session_key: Option<String>,
    /// Temp workspace to use when the action names no workspace.
    #[serde(default)]
    pub temp_workspace: Option<TempWorkspaceKey>,
}

impl CreateTaskOptions {
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = Some(key.into());
        self
    }

    pub fn with_temp_workspace(mut self, key: TempWorkspaceKey) -> Self {
        self.temp_workspace = Some(key);
        self
    }
}

/// Result of an ingress call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressOutcome {
    pub task_id: String,
    pub workspace_id: String,
    /// True when an earlier delivery for the same session key already created the task.
    pub duplicate: bool,
}

/// What the task creator is asked to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub title: String,
    pub prompt: String,
    pub workspace_id: String,
}

/// Handle returned by the task creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub id: String,
}

/// Lifecycle state of a task as far as this crate tracks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A task as reported by the task creator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub prompt: String,
    pub workspace_id: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
}
