//! Task queue inspection.

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::Cell;
use serde::Serialize;

use crate::cli::context::AppContext;
use crate::cli::output::{list_table, output, render_list, short_id, truncate, CommandOutput};
use crate::domain::models::TaskSummary;

#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List queued tasks, newest first
    List {
        /// Only show tasks of this workspace
        #[arg(long)]
        workspace: Option<String>,

        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskSummary>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "title", "status", "workspace", "created"]);
        for task in &self.tasks {
            table.add_row(vec![
                Cell::new(short_id(&task.id)),
                Cell::new(truncate(&task.title, 40)),
                Cell::new(task.status.as_str()),
                Cell::new(truncate(&task.workspace_id, 30)),
                Cell::new(task.created_at.format("%Y-%m-%d %H:%M:%S")),
            ]);
        }
        render_list("task", &table, self.total)
    }
}

pub async fn execute(args: TaskArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::load().await?;

    match args.command {
        TaskCommands::List { workspace, limit } => {
            let tasks = ctx.tasks.list(workspace.as_deref(), limit).await?;
            let out = TaskListOutput {
                total: tasks.len(),
                tasks,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
