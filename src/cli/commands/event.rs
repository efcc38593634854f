//! Event CLI commands.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use serde::Serialize;
use serde_json::Value;

use crate::adapters::http::events_client::DEFAULT_EMIT_TIMEOUT;
use crate::adapters::http::EventsHttpClient;
use crate::cli::context::AppContext;
use crate::cli::output::{list_table, output, render_list, short_id, truncate, CommandOutput};
use crate::domain::models::{TriggerEvent, TriggerHistoryEntry};
use crate::infrastructure::config::ConfigLoader;
use crate::services::event_from_pairs;

#[derive(Args, Debug)]
pub struct EventArgs {
    #[command(subcommand)]
    pub command: EventCommands,
}

#[derive(Subcommand, Debug)]
pub enum EventCommands {
    /// Evaluate an inbound event against enabled triggers
    Emit {
        /// Event source, e.g. `gmail`
        #[arg(long)]
        source: String,

        /// Event field as `key=value`; values parse as JSON when they can. Repeatable.
        #[arg(long = "field", conflicts_with = "data")]
        fields: Vec<String>,

        /// Event fields as one JSON object
        #[arg(long)]
        data: Option<String>,

        /// Send the event to the listener of a running `hookwise run` instead of evaluating it here
        #[arg(long)]
        remote: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct EmitOutput {
    pub source: String,
    pub fired: Vec<TriggerHistoryEntry>,
}

impl CommandOutput for EmitOutput {
    fn to_human(&self) -> String {
        if self.fired.is_empty() {
            return format!("No triggers fired for '{}'.", self.source);
        }
        let mut table = list_table(&["trigger", "result", "task"]);
        for entry in &self.fired {
            table.add_row(vec![
                Cell::new(short_id(&entry.trigger_id.to_string())),
                Cell::new(truncate(&entry.action_result, 60)),
                Cell::new(entry.task_id.as_deref().map_or("-", short_id)),
            ]);
        }
        render_list("fired trigger", &table, self.fired.len())
    }
}

/// Build the event from either `--field` pairs or a `--data` object.
pub fn build_event(source: &str, fields: &[String], data: Option<&str>) -> Result<TriggerEvent> {
    if let Some(raw) = data {
        let value: Value = serde_json::from_str(raw).context("--data must be valid JSON")?;
        let Value::Object(map) = value else {
            bail!("--data must be a JSON object");
        };
        let mut event = TriggerEvent::new(source);
        event.fields = map;
        return Ok(event);
    }

    let pairs = fields
        .iter()
        .map(|raw| {
            raw.split_once('=')
                .filter(|(k, _)| !k.trim().is_empty())
                .map(|(k, v)| (k.trim(), v))
                .with_context(|| format!("Field '{raw}' must look like key=value"))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(event_from_pairs(source, pairs))
}

pub async fn execute(args: EventArgs, json_mode: bool) -> Result<()> {
    match args.command {
        EventCommands::Emit {
            source,
            fields,
            data,
            remote,
        } => {
            let event = build_event(&source, &fields, data.as_deref())?;
            let fired = if remote {
                let config = ConfigLoader::load().context("Failed to load configuration")?;
                let client = EventsHttpClient::new(&config.server.base_url(), DEFAULT_EMIT_TIMEOUT)?;
                client.emit(&event).await?
            } else {
                let ctx = AppContext::load().await?;
                let engine = ctx.trigger_engine().await?;
                let fired = engine.evaluate_event(&event).await;
                engine.stop();
                fired
            };
            output(&EmitOutput { source, fired }, json_mode);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_event_from_pairs() {
        let fields = vec!["subject=New invoice".to_string(), "amount=120".to_string(), "tags=[\"a\"]".to_string()];
        let event = build_event("gmail", &fields, None).unwrap();
        assert_eq!(event.source, "gmail");
        assert_eq!(event.lookup("subject"), Some(&json!("New invoice")));
        assert_eq!(event.lookup("amount"), Some(&json!(120)));
        assert_eq!(event.lookup("tags"), Some(&json!(["a"])));
    }

    #[test]
    fn test_build_event_from_data() {
        let event = build_event("gmail", &[], Some(r#"{"from": {"address": "a@b.c"}}"#)).unwrap();
        assert_eq!(event.lookup("from.address"), Some(&json!("a@b.c")));
        assert!(build_event("gmail", &[], Some("[1]")).is_err());
    }

    #[test]
    fn test_malformed_pair_is_rejected() {
        assert!(build_event("gmail", &["novalue".to_string()], None).is_err());
        assert!(build_event("gmail", &["=x".to_string()], None).is_err());
    }
}
