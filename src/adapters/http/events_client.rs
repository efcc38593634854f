//! Client for the events listener of a running `hookwise run`.

use reqwest::{Client, Url};
use std::time::Duration;

use super::events_server::{EmitResponse, ErrorResponse};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{TriggerEvent, TriggerHistoryEntry};

/// Evaluation may create tasks and wait on a busy session key.
pub const DEFAULT_EMIT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct EventsHttpClient {
    http: Client,
    base_url: Url,
}

impl EventsHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> DomainResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| DomainError::ValidationFailed(format!("Invalid listener URL '{base_url}': {e}")))?;
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hookwise/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::ExecutionFailed(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, base_url })
    }

    fn events_url(&self, source: &str) -> DomainResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| DomainError::ValidationFailed(format!("Listener URL '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["events", source]);
        Ok(url)
    }

    /// Send an event and return the firings it caused.
    pub async fn emit(&self, event: &TriggerEvent) -> DomainResult<Vec<TriggerHistoryEntry>> {
        let url = self.events_url(&event.source)?;
        let resp = self
            .http
            .post(url)
            .json(&event.fields)
            .send()
            .await
            .map_err(|e| DomainError::ExecutionFailed(format!("Event listener request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map_or_else(|_| body.chars().take(200).collect(), |e| e.error);
            return Err(DomainError::ExecutionFailed(format!("Event listener returned {status}: {message}")));
        }

        let body: EmitResponse = resp.json().await.map_err(|e| {
            DomainError::SerializationError(format!("Unexpected event listener response: {e}"))
        })?;
        Ok(body.fired)
    }
}
