//! `hookwise run`: serve events to the trigger engine and poll mentions until interrupted.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::adapters::http::{EventsHttpConfig, EventsHttpServer};
use crate::cli::context::AppContext;
use crate::cli::output::{detail_lines, output, CommandOutput};
use crate::infrastructure::config::ReloadingBridgeSettings;
use crate::services::BridgeStatus;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Do not start the HTTP event listener
    #[arg(long)]
    pub no_listener: bool,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub triggers_loaded: usize,
    pub listener: Option<String>,
    pub bridge: BridgeStatus,
}

impl CommandOutput for RunOutput {
    fn to_human(&self) -> String {
        let b = &self.bridge;
        detail_lines(&[
            ("Triggers", self.triggers_loaded.to_string()),
            ("Listener", self.listener.clone().unwrap_or_else(|| "off".to_string())),
            ("Bridge", b.state.as_str().to_string()),
            ("Polls", b.polls.to_string()),
            ("Accepted", b.accepted.to_string()),
            ("Duplicates", b.duplicates.to_string()),
            ("Ignored", b.ignored.to_string()),
            ("Errors", b.errors.to_string()),
            ("Last error", b.last_error.clone().unwrap_or_else(|| "-".to_string())),
        ])
    }
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::load().await?;
    let engine = Arc::new(ctx.trigger_engine().await?);
    let triggers_loaded = engine.list_triggers(None).await.len();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let listener = if ctx.config.server.enabled && !args.no_listener {
        let server = EventsHttpServer::new(engine.clone(), EventsHttpConfig::from(&ctx.config.server));
        let socket = server.bind().await.with_context(|| {
            format!(
                "Failed to bind event listener on {}:{}",
                ctx.config.server.host, ctx.config.server.port
            )
        })?;
        let addr = socket.local_addr().context("Failed to read listener address")?;
        let handle = tokio::spawn(server.serve_with_shutdown(socket, async move {
            let _ = shutdown_rx.await;
        }));
        Some((addr.to_string(), handle))
    } else {
        None
    };

    let settings = Arc::new(ReloadingBridgeSettings::new(".", ctx.config.bridge.clone()));
    let bridge = ctx.mention_bridge(settings);
    bridge.start().await;

    tracing::info!(
        triggers = triggers_loaded,
        listener = listener.as_ref().map_or("off", |(addr, _)| addr.as_str()),
        "hookwise running; press Ctrl-C to stop"
    );
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");

    let _ = shutdown_tx.send(());
    let listener = match listener {
        Some((addr, handle)) => {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "event listener failed"),
                Err(e) => tracing::warn!(error = %e, "event listener task ended abnormally"),
            }
            Some(addr)
        }
        None => None,
    };
    bridge.stop().await;
    engine.stop();

    output(
        &RunOutput {
            triggers_loaded,
            listener,
            bridge: bridge.status().await,
        },
        json_mode,
    );
    Ok(())
}
