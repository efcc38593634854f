//! Trigger CLI commands.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use comfy_table::Cell;
use serde::Serialize;
use serde_json::Value;

use crate::cli::context::AppContext;
use crate::cli::id_resolver::resolve_trigger_id;
use crate::cli::output::{detail_lines, list_table, output, render_list, short_id, truncate, CommandOutput};
use crate::domain::models::{
    ConditionLogic, ConditionOperator, NewTrigger, Trigger, TriggerAction, TriggerCondition, TriggerHistoryEntry,
    TriggerUpdate,
};
use crate::services::TriggerEngine;

#[derive(Args, Debug)]
pub struct TriggerArgs {
    #[command(subcommand)]
    pub command: TriggerCommands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ActionKind {
    CreateTask,
    SendMessage,
    WakeAgent,
}

#[derive(Args, Debug)]
pub struct AddTriggerArgs {
    /// Trigger name
    #[arg(long)]
    pub name: String,

    /// Event source the trigger listens to, e.g. `gmail`
    #[arg(long)]
    pub source: String,

    /// Action to run when the trigger fires
    #[arg(long, value_enum)]
    pub action: ActionKind,

    /// Condition as `<field> <op> [value]`, e.g. `subject contains invoice`. Repeatable.
    #[arg(long = "when")]
    pub conditions: Vec<String>,

    /// Fire when any condition matches instead of all
    #[arg(long)]
    pub any: bool,

    /// Task title template (create-task)
    #[arg(long)]
    pub title: Option<String>,

    /// Task or wake prompt template (create-task, wake-agent)
    #[arg(long)]
    pub prompt: Option<String>,

    /// Channel type (send-message)
    #[arg(long)]
    pub channel_type: Option<String>,

    /// Channel id (send-message)
    #[arg(long)]
    pub channel_id: Option<String>,

    /// Message template (send-message)
    #[arg(long)]
    pub message: Option<String>,

    /// Agent role to wake (wake-agent)
    #[arg(long)]
    pub agent_role: Option<String>,

    /// Workspace the trigger belongs to; created tasks run there
    #[arg(long)]
    pub workspace: Option<String>,

    /// Minimum milliseconds between two firings
    #[arg(long)]
    pub cooldown_ms: Option<u64>,

    #[arg(long)]
    pub description: Option<String>,

    /// Create the trigger disabled
    #[arg(long)]
    pub disabled: bool,
}

#[derive(Subcommand, Debug)]
pub enum TriggerCommands {
    /// Create a trigger
    Add {
        #[command(flatten)]
        args: Box<AddTriggerArgs>,
    },
    /// List triggers
    List {
        /// Only show triggers of this workspace
        #[arg(long)]
        workspace: Option<String>,
    },
    /// Show trigger details
    Show {
        /// Trigger ID or unique prefix
        id: String,
    },
    /// Enable a trigger
    Enable {
        /// Trigger ID or unique prefix
        id: String,
    },
    /// Disable a trigger
    Disable {
        /// Trigger ID or unique prefix
        id: String,
    },
    /// Delete a trigger and its history
    Remove {
        /// Trigger ID or unique prefix
        id: String,
    },
    /// Show recent firings, newest first
    History {
        /// Trigger ID or unique prefix
        id: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Debug, Serialize)]
pub struct TriggerSummaryOutput {
    pub id: String,
    pub name: String,
    pub source: String,
    pub action: String,
    pub enabled: bool,
    pub workspace_id: String,
    pub fire_count: u64,
    pub last_fired_at: Option<String>,
}

impl From<&Trigger> for TriggerSummaryOutput {
    fn from(t: &Trigger) -> Self {
        Self {
            id: t.id.to_string(),
            name: t.name.clone(),
            source: t.source.clone(),
            action: t.action.kind().to_string(),
            enabled: t.enabled,
            workspace_id: t.workspace_id.clone(),
            fire_count: t.fire_count,
            last_fired_at: t.last_fired_at.map(|at| at.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TriggerListOutput {
    pub triggers: Vec<TriggerSummaryOutput>,
    pub total: usize,
}

impl CommandOutput for TriggerListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "name", "source", "action", "enabled", "fired", "last fired"]);
        for t in &self.triggers {
            table.add_row(vec![
                Cell::new(short_id(&t.id)),
                Cell::new(truncate(&t.name, 30)),
                Cell::new(&t.source),
                Cell::new(&t.action),
                Cell::new(if t.enabled { "yes" } else { "no" }),
                Cell::new(t.fire_count),
                Cell::new(t.last_fired_at.as_deref().unwrap_or("-")),
            ]);
        }
        render_list("trigger", &table, self.total)
    }
}

/// Full trigger as stored.
#[derive(Debug, Serialize)]
pub struct TriggerDetailOutput {
    #[serde(flatten)]
    pub trigger: Trigger,
}

impl CommandOutput for TriggerDetailOutput {
    fn to_human(&self) -> String {
        let t = &self.trigger;
        detail_lines(&[
            ("Trigger", t.name.clone()),
            ("ID", t.id.to_string()),
            ("Description", t.description.clone().unwrap_or_else(|| "-".to_string())),
            ("Enabled", t.enabled.to_string()),
            ("Source", t.source.clone()),
            ("Workspace", if t.workspace_id.is_empty() { "-".to_string() } else { t.workspace_id.clone() }),
            ("Cooldown", format!("{}ms", t.cooldown_ms)),
            ("Fire count", t.fire_count.to_string()),
            ("Last fired", t.last_fired_at.map_or_else(|| "never".to_string(), |at| at.to_rfc3339())),
            ("Logic", t.condition_logic.as_str().to_string()),
            ("Conditions", pretty_json(&t.conditions)),
            ("Action", pretty_json(&t.action)),
        ])
    }
}

fn pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

#[derive(Debug, Serialize)]
pub struct TriggerActionOutput {
    pub success: bool,
    pub message: String,
    pub trigger_id: String,
}

impl CommandOutput for TriggerActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct TriggerHistoryOutput {
    pub trigger_id: String,
    pub entries: Vec<TriggerHistoryEntry>,
}

impl CommandOutput for TriggerHistoryOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["fired at", "result", "task"]);
        for entry in &self.entries {
            table.add_row(vec![
                Cell::new(entry.fired_at.to_rfc3339()),
                Cell::new(truncate(&entry.action_result, 60)),
                Cell::new(entry.task_id.as_deref().map_or("-", short_id)),
            ]);
        }
        render_list("firing", &table, self.entries.len())
    }
}

/// Parse `<field> <op> [value]`; the value is JSON when it parses, else a string.
pub fn parse_condition(raw: &str) -> Result<TriggerCondition> {
    let mut parts = raw.trim().splitn(3, char::is_whitespace);
    let (Some(field), Some(op)) = (parts.next().filter(|f| !f.is_empty()), parts.next()) else {
        bail!("Condition '{raw}' must look like '<field> <op> [value]'");
    };
    let op = ConditionOperator::parse_str(op).with_context(|| format!("Unknown condition operator '{op}'"))?;
    let value = match parts.next().map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) => serde_json::from_str::<Value>(v).unwrap_or_else(|_| Value::String(v.to_string())),
        None if matches!(op, ConditionOperator::Exists | ConditionOperator::NotExists) => Value::Null,
        None => bail!("Condition '{raw}' needs a value"),
    };
    Ok(TriggerCondition::new(field, op, value))
}

fn required(value: Option<String>, flag: &str, action: &str) -> Result<String> {
    value.with_context(|| format!("--{flag} is required for {action}"))
}

fn build_action(args: &AddTriggerArgs) -> Result<TriggerAction> {
    let action = match args.action {
        ActionKind::CreateTask => {
            let prompt = required(args.prompt.clone(), "prompt", "create-task")?;
            TriggerAction::CreateTask {
                title: args.title.clone().unwrap_or_else(|| args.name.clone()),
                prompt,
                workspace_id: None,
            }
        }
        ActionKind::SendMessage => TriggerAction::SendMessage {
            channel_type: required(args.channel_type.clone(), "channel-type", "send-message")?,
            channel_id: required(args.channel_id.clone(), "channel-id", "send-message")?,
            message: required(args.message.clone(), "message", "send-message")?,
        },
        ActionKind::WakeAgent => TriggerAction::WakeAgent {
            agent_role_id: required(args.agent_role.clone(), "agent-role", "wake-agent")?,
            prompt: required(args.prompt.clone(), "prompt", "wake-agent")?,
        },
    };
    Ok(action)
}

/// Translate `trigger add` flags into trigger input.
pub fn build_new_trigger(args: &AddTriggerArgs) -> Result<NewTrigger> {
    let mut input = NewTrigger::new(args.name.clone(), args.source.clone(), build_action(args)?);
    for raw in &args.conditions {
        input = input.with_condition(parse_condition(raw)?);
    }
    if args.any {
        input = input.with_logic(ConditionLogic::Any);
    }
    if let Some(ws) = &args.workspace {
        input = input.with_workspace(ws.clone());
    }
    if let Some(ms) = args.cooldown_ms {
        input = input.with_cooldown_ms(ms);
    }
    input.description.clone_from(&args.description);
    input.enabled = !args.disabled;
    Ok(input)
}

pub async fn execute(args: TriggerArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::load().await?;
    let engine = ctx.trigger_engine().await?;

    match args.command {
        TriggerCommands::Add { args: add } => {
            let trigger = engine.add_trigger(build_new_trigger(&add)?).await?;
            output(
                &TriggerActionOutput {
                    success: true,
                    message: format!("Created trigger '{}' ({})", trigger.name, trigger.id),
                    trigger_id: trigger.id.to_string(),
                },
                json_mode,
            );
        }

        TriggerCommands::List { workspace } => {
            let triggers = engine.list_triggers(workspace.as_deref()).await;
            let out = TriggerListOutput {
                total: triggers.len(),
                triggers: triggers.iter().map(TriggerSummaryOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        TriggerCommands::Show { id } => {
            let id = resolve_trigger_id(&ctx.pool, &id).await?;
            let trigger = engine
                .get_trigger(id)
                .await
                .with_context(|| format!("Trigger {id} not found"))?;
            output(&TriggerDetailOutput { trigger }, json_mode);
        }

        TriggerCommands::Enable { id } => set_enabled(&ctx, &engine, &id, true, json_mode).await?,

        TriggerCommands::Disable { id } => set_enabled(&ctx, &engine, &id, false, json_mode).await?,

        TriggerCommands::Remove { id } => {
            let id = resolve_trigger_id(&ctx.pool, &id).await?;
            engine.remove_trigger(id).await?;
            output(
                &TriggerActionOutput {
                    success: true,
                    message: format!("Removed trigger {id}"),
                    trigger_id: id.to_string(),
                },
                json_mode,
            );
        }

        TriggerCommands::History { id, limit } => {
            let id = resolve_trigger_id(&ctx.pool, &id).await?;
            let entries = engine.get_history(id, limit).await?;
            output(
                &TriggerHistoryOutput {
                    trigger_id: id.to_string(),
                    entries,
                },
                json_mode,
            );
        }
    }

    Ok(())
}

async fn set_enabled(
    ctx: &AppContext,
    engine: &TriggerEngine,
    id: &str,
    enabled: bool,
    json_mode: bool,
) -> Result<()> {
    let id = resolve_trigger_id(&ctx.pool, id).await?;
    let trigger = engine
        .update_trigger(
            id,
            TriggerUpdate {
                enabled: Some(enabled),
                ..TriggerUpdate::default()
            },
        )
        .await?;
    let verb = if enabled { "Enabled" } else { "Disabled" };
    output(
        &TriggerActionOutput {
            success: true,
            message: format!("{verb} trigger '{}'", trigger.name),
            trigger_id: id.to_string(),
        },
        json_mode,
    );
    Ok(())
}
