//! Mention bridge: polls the external mention feed and turns accepted
//! commands into idempotent ingress calls.
//!
//! One background task drives the loop. Each cycle re-reads the settings, so
//! cadence, allowlist and enablement can change without a restart. A poll
//! already in flight is never overlapped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;

use crate::domain::models::{
    AgentAction, BridgeConfig, CreateTaskOptions, MentionRejectReason, ParsedMentionCommand, TempWorkspaceKey,
};
use crate::domain::ports::{BridgeSettingsSource, MentionFetcher};
use crate::services::ingress::IngressCoordinator;
use crate::services::mention_command::{
    build_mention_task_prompt, build_mention_task_title, parse_mention_trigger_command,
};
use crate::services::mention_source::{fetch_mentions_with_retry, parse_bird_mentions, sort_mentions_oldest_first};

/// Lower bound on the delay between two polls.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Session key prefix for mention-driven tasks.
pub const MENTION_SESSION_PREFIX: &str = "xmention";

/// Temp workspace scope for mention-driven tasks; one workspace per author.
pub const MENTION_TEMP_SCOPE: &str = "xmention";

/// Settings that never change; used by one-shot commands and tests.
#[derive(Debug, Clone)]
pub struct StaticBridgeSettings(pub BridgeConfig);

#[async_trait]
impl BridgeSettingsSource for StaticBridgeSettings {
    async fn current(&self) -> BridgeConfig {
        self.0.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeState {
    Stopped,
    Idle,
    Polling,
    Disabled,
    Unhealthy,
}

impl BridgeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Idle => "idle",
            Self::Polling => "polling",
            Self::Disabled => "disabled",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Read-only snapshot for observability surfaces. Counters are cumulative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeStatus {
    pub state: BridgeState,
    pub running: bool,
    pub polls: u64,
    pub last_poll_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub accepted: u64,
    pub duplicates: u64,
    pub ignored: u64,
    pub ignored_by_reason: BTreeMap<MentionRejectReason, u64>,
    /// Failed polls plus mentions whose task creation failed.
    pub errors: u64,
    pub last_task_id: Option<String>,
}

impl Default for BridgeStatus {
    fn default() -> Self {
        Self {
            state: BridgeState::Stopped,
            running: false,
            polls: 0,
            last_poll_at: None,
            last_success_at: None,
            last_error: None,
            last_error_at: None,
            accepted: 0,
            duplicates: 0,
            ignored: 0,
            ignored_by_reason: BTreeMap::new(),
            errors: 0,
            last_task_id: None,
        }
    }
}

/// Per-poll tallies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PollSummary {
    pub fetched: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub ignored: BTreeMap<MentionRejectReason, usize>,
    pub errors: usize,
    pub task_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Another poll was still running.
    InFlight,
    Disabled,
    NotInstalled,
    FetchFailed(String),
    Completed(PollSummary),
}

/// Clears the in-flight flag when the poll ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct MentionBridge {
    fetcher: Arc<dyn MentionFetcher>,
    settings: Arc<dyn BridgeSettingsSource>,
    ingress: Arc<IngressCoordinator>,
    running: AtomicBool,
    in_flight: AtomicBool,
    shutdown: Notify,
    worker: Mutex<Option<JoinHandle<()>>>,
    status: RwLock<BridgeStatus>,
}

impl MentionBridge {
    pub fn new(
        fetcher: Arc<dyn MentionFetcher>,
        settings: Arc<dyn BridgeSettingsSource>,
        ingress: Arc<IngressCoordinator>,
    ) -> Self {
        Self {
            fetcher,
            settings,
            ingress,
            running: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            shutdown: Notify::new(),
            worker: Mutex::new(None),
            status: RwLock::new(BridgeStatus::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub async fn status(&self) -> BridgeStatus {
        self.status.read().await.clone()
    }

    /// Spawn the polling loop. The first poll runs immediately.
    /// Calling `start` on a running bridge does nothing.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::AcqRel) {
            return;
        }
        self.status.write().await.running = true;

        let bridge = Arc::clone(self);
        let handle = tokio::spawn(async move {
            tracing::info!("mention bridge started");
            while bridge.is_running() {
                bridge.poll_once().await;
                if !bridge.is_running() {
                    break;
                }
                let delay = Self::poll_interval(&bridge.settings.current().await);
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = bridge.shutdown.notified() => {}
                }
            }
            tracing::info!("mention bridge stopped");
        });
        *self.worker.lock().await = Some(handle);
    }

    /// Stop the loop and wait for it to exit. An in-flight poll finishes
    /// but no further poll is scheduled.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::AcqRel) {
            return;
        }
        self.shutdown.notify_one();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "mention bridge worker ended abnormally");
            }
        }
        let mut status = self.status.write().await;
        status.running = false;
        status.state = BridgeState::Stopped;
    }

    /// Delay before the next poll: the configured interval, never below [`MIN_POLL_INTERVAL`].
    pub fn poll_interval(settings: &BridgeConfig) -> Duration {
        Duration::from_millis(settings.poll_interval_ms).max(MIN_POLL_INTERVAL)
    }

    /// Run one poll cycle.
    pub async fn poll_once(&self) -> PollOutcome {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            tracing::debug!("mention poll already in flight; skipping");
            return PollOutcome::InFlight;
        };

        let settings = self.settings.current().await;
        if !settings.enabled || settings.native_channel_active {
            self.status.write().await.state = BridgeState::Disabled;
            tracing::debug!(
                enabled = settings.enabled,
                native_channel_active = settings.native_channel_active,
                "mention bridge disabled"
            );
            return PollOutcome::Disabled;
        }

        {
            let mut status = self.status.write().await;
            status.state = BridgeState::Polling;
            status.polls += 1;
            status.last_poll_at = Some(Utc::now());
        }

        if !self.fetcher.is_installed().await {
            let message = format!("mention command '{}' is not installed", settings.binary);
            tracing::warn!(binary = %settings.binary, "mention command not installed");
            self.record_failure(BridgeState::Unhealthy, message).await;
            return PollOutcome::NotInstalled;
        }

        let raw = match fetch_mentions_with_retry(self.fetcher.as_ref(), &settings, settings.fetch_count).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "mention fetch failed");
                let message = e.to_string();
                self.record_failure(BridgeState::Unhealthy, message.clone()).await;
                return PollOutcome::FetchFailed(message);
            }
        };

        let mut mentions = parse_bird_mentions(&raw);
        sort_mentions_oldest_first(&mut mentions);
        let trigger_settings = settings.trigger_settings();

        let mut summary = PollSummary {
            fetched: mentions.len(),
            ..PollSummary::default()
        };

        for mention in &mentions {
            match parse_mention_trigger_command(mention, &trigger_settings) {
                Ok(parsed) => self.dispatch(&parsed, &mut summary).await,
                Err(reason) => {
                    tracing::debug!(tweet_id = %mention.tweet_id, author = %mention.author, reason = %reason, "mention ignored");
                    *summary.ignored.entry(reason).or_insert(0) += 1;
                }
            }
        }

        self.record_success(&summary).await;
        tracing::info!(
            fetched = summary.fetched,
            accepted = summary.accepted,
            duplicates = summary.duplicates,
            errors = summary.errors,
            "mention poll complete"
        );
        PollOutcome::Completed(summary)
    }

    async fn dispatch(&self, parsed: &ParsedMentionCommand, summary: &mut PollSummary) {
        let mention = &parsed.mention;
        let session_key = format!("{MENTION_SESSION_PREFIX}:{}", mention.tweet_id);
        let action = AgentAction::new(build_mention_task_prompt(parsed)).with_title(build_mention_task_title(parsed));
        let options = CreateTaskOptions::default()
            .with_session_key(session_key.as_str())
            .with_temp_workspace(TempWorkspaceKey::new(MENTION_TEMP_SCOPE, mention.author.as_str()));

        match self.ingress.create_task_from_agent_action(&action, &options).await {
            Ok(outcome) if outcome.duplicate => {
                tracing::debug!(session_key = %session_key, task_id = %outcome.task_id, "mention already handled");
                summary.duplicates += 1;
            }
            Ok(outcome) => {
                tracing::info!(session_key = %session_key, task_id = %outcome.task_id, workspace_id = %outcome.workspace_id, "task created from mention");
                summary.accepted += 1;
                summary.task_ids.push(outcome.task_id);
            }
            Err(e) => {
                tracing::warn!(session_key = %session_key, error = %e, "failed to create task from mention");
                summary.errors += 1;
            }
        }
    }

    async fn record_failure(&self, state: BridgeState, message: String) {
        let mut status = self.status.write().await;
        status.state = state;
        status.errors += 1;
        status.last_error = Some(message);
        status.last_error_at = Some(Utc::now());
    }

    async fn record_success(&self, summary: &PollSummary) {
        let mut status = self.status.write().await;
        status.state = BridgeState::Idle;
        status.last_success_at = Some(Utc::now());
        status.accepted += summary.accepted as u64;
        status.duplicates += summary.duplicates as u64;
        status.errors += summary.errors as u64;
        for (reason, count) in &summary.ignored {
            status.ignored += *count as u64;
            *status.ignored_by_reason.entry(*reason).or_insert(0) += *count as u64;
        }
        if let Some(last) = summary.task_ids.last() {
            status.last_task_id = Some(last.clone());
        }
    }
}
