//! Mention bridge CLI commands.

use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::sync::Arc;

use crate::cli::context::AppContext;
use crate::cli::output::{detail_lines, output, CommandOutput};
use crate::domain::ports::MentionFetcher;
use crate::services::{MentionBridge, PollOutcome, PollSummary, StaticBridgeSettings};

#[derive(Args, Debug)]
pub struct BridgeArgs {
    #[command(subcommand)]
    pub command: BridgeCommands,
}

#[derive(Subcommand, Debug)]
pub enum BridgeCommands {
    /// Run a single poll cycle now
    Poll {
        /// Poll even when the bridge is disabled in config
        #[arg(long)]
        force: bool,
    },
    /// Show bridge configuration and fetcher health
    Status,
}

#[derive(Debug, Serialize)]
pub struct PollOutput {
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PollSummary>,
}

impl From<PollOutcome> for PollOutput {
    fn from(outcome: PollOutcome) -> Self {
        let (name, detail, summary) = match outcome {
            PollOutcome::InFlight => ("in_flight", None, None),
            PollOutcome::Disabled => ("disabled", None, None),
            PollOutcome::NotInstalled => ("not_installed", None, None),
            PollOutcome::FetchFailed(e) => ("fetch_failed", Some(e), None),
            PollOutcome::Completed(summary) => ("completed", None, Some(summary)),
        };
        Self {
            outcome: name.to_string(),
            detail,
            summary,
        }
    }
}

impl CommandOutput for PollOutput {
    fn to_human(&self) -> String {
        let Some(summary) = &self.summary else {
            return match &self.detail {
                Some(detail) => format!("Poll {}: {detail}", self.outcome),
                None => format!("Poll {}.", self.outcome.replace('_', " ")),
            };
        };
        let ignored = if summary.ignored.is_empty() {
            "0".to_string()
        } else {
            summary
                .ignored
                .iter()
                .map(|(reason, n)| format!("{n} {}", reason.as_str()))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut pairs = vec![
            ("Fetched", summary.fetched.to_string()),
            ("Accepted", summary.accepted.to_string()),
            ("Duplicates", summary.duplicates.to_string()),
            ("Ignored", ignored),
            ("Errors", summary.errors.to_string()),
        ];
        if !summary.task_ids.is_empty() {
            pairs.push(("Tasks", summary.task_ids.join(", ")));
        }
        detail_lines(&pairs)
    }
}

#[derive(Debug, Serialize)]
pub struct BridgeStatusOutput {
    pub enabled: bool,
    pub native_channel_active: bool,
    pub binary: String,
    pub installed: bool,
    pub prefix: String,
    pub allowlist: Vec<String>,
    pub fetch_count: u32,
    pub effective_poll_interval_secs: u64,
}

impl CommandOutput for BridgeStatusOutput {
    fn to_human(&self) -> String {
        let allowlist = if self.allowlist.is_empty() {
            "(empty: every author is rejected)".to_string()
        } else {
            self.allowlist.join(", ")
        };
        detail_lines(&[
            ("Enabled", self.enabled.to_string()),
            ("Native channel", self.native_channel_active.to_string()),
            ("Binary", format!("{} ({})", self.binary, if self.installed { "installed" } else { "missing" })),
            ("Prefix", self.prefix.clone()),
            ("Allowlist", allowlist),
            ("Fetch count", self.fetch_count.to_string()),
            ("Poll interval", format!("{}s", self.effective_poll_interval_secs)),
        ])
    }
}

pub async fn execute(args: BridgeArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::load().await?;

    match args.command {
        BridgeCommands::Poll { force } => {
            let mut settings = ctx.config.bridge.clone();
            if force {
                settings.enabled = true;
            }
            let bridge = ctx.mention_bridge(Arc::new(StaticBridgeSettings(settings)));
            let outcome = bridge.poll_once().await;
            let failed = matches!(outcome, PollOutcome::NotInstalled | PollOutcome::FetchFailed(_));
            output(&PollOutput::from(outcome), json_mode);
            if failed {
                bail!("Mention poll failed");
            }
        }

        BridgeCommands::Status => {
            let settings = &ctx.config.bridge;
            let installed = ctx.mention_fetcher().is_installed().await;
            let out = BridgeStatusOutput {
                enabled: settings.enabled,
                native_channel_active: settings.native_channel_active,
                binary: settings.binary.clone(),
                installed,
                prefix: settings.prefix.clone(),
                allowlist: settings.allowlist.clone(),
                fetch_count: settings.fetch_count,
                effective_poll_interval_secs: MentionBridge::poll_interval(settings).as_secs(),
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::MentionRejectReason;

    #[test]
    fn test_poll_output_from_outcome() {
        let out = PollOutput::from(PollOutcome::FetchFailed("timed out".to_string()));
        assert_eq!(out.outcome, "fetch_failed");
        assert_eq!(out.to_human(), "Poll fetch_failed: timed out");

        let mut summary = PollSummary {
            fetched: 3,
            accepted: 1,
            ..PollSummary::default()
        };
        summary.ignored.insert(MentionRejectReason::NotAllowlisted, 2);
        let out = PollOutput::from(PollOutcome::Completed(summary));
        assert_eq!(out.outcome, "completed");
        assert!(out.to_human().contains("2 not-allowlisted"));
    }
}
