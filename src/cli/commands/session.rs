//! Session mapping inspection.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{detail_lines, output, CommandOutput};
use crate::domain::models::{normalize_session_key, HookSessionRecord, SessionLock, TaskSummary};
use crate::domain::ports::{HookSessionRepository, TaskCreator};

#[derive(Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommands,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// Show which task a session key maps to and whether it is locked
    Show {
        /// Session key, e.g. `xmention:1234`
        key: String,
    },
}

#[derive(Debug, Serialize)]
pub struct SessionOutput {
    pub session_key: String,
    pub session: Option<HookSessionRecord>,
    pub task: Option<TaskSummary>,
    pub lock: Option<SessionLock>,
}

impl CommandOutput for SessionOutput {
    fn to_human(&self) -> String {
        let mut pairs = vec![("Session", self.session_key.clone())];
        match &self.session {
            Some(session) => {
                pairs.push(("Task", session.task_id.clone()));
                pairs.push(("Mapped at", session.created_at.to_rfc3339()));
                match &self.task {
                    Some(task) => {
                        pairs.push(("Title", task.title.clone()));
                        pairs.push(("Status", task.status.as_str().to_string()));
                        pairs.push(("Workspace", task.workspace_id.clone()));
                    }
                    None => pairs.push(("Status", "task no longer exists".to_string())),
                }
            }
            None => pairs.push(("Task", "not created yet".to_string())),
        }
        let lock = self
            .lock
            .as_ref()
            .map_or_else(|| "free".to_string(), |lock| format!("held until {}", lock.expires_at.to_rfc3339()));
        pairs.push(("Lock", lock));
        detail_lines(&pairs)
    }
}

pub async fn execute(args: SessionArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::load().await?;

    match args.command {
        SessionCommands::Show { key } => {
            let key = normalize_session_key(&key).context("Session key must not be empty")?;
            let session = ctx.sessions.find_by_session_key(key).await?;
            let lock = ctx.sessions.find_lock(key).await?;
            if session.is_none() && lock.is_none() {
                bail!("No task recorded for session '{key}'");
            }
            let task = match &session {
                Some(session) => ctx.tasks.get_task(&session.task_id).await?,
                None => None,
            };
            output(
                &SessionOutput {
                    session_key: key.to_string(),
                    session,
                    task,
                    lock,
                },
                json_mode,
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_in_flight_session_shows_lock() {
        let now = Utc::now();
        let out = SessionOutput {
            session_key: "xmention:9".to_string(),
            session: None,
            task: None,
            lock: Some(SessionLock {
                session_key: "xmention:9".to_string(),
                created_at: now,
                expires_at: now + Duration::minutes(2),
            }),
        };
        let human = out.to_human();
        assert!(human.contains("not created yet"));
        assert!(human.contains("held until"));
    }
}
