//! HTTP webhook implementation of [`ChannelDelivery`] and [`AgentWaker`].
//!
//! Each action is a JSON POST to a configured endpoint. Non-2xx responses,
//! transport failures and unconfigured endpoints all surface as
//! [`DomainError::ExecutionFailed`] so the trigger engine records them in history.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::DeliveryConfig;
use crate::domain::ports::{AgentWaker, ChannelDelivery};

#[derive(Debug, Clone)]
pub struct WebhookDeliveryConfig {
    pub message_url: Option<String>,
    pub wake_url: Option<String>,
    pub timeout: Duration,
}

impl From<&DeliveryConfig> for WebhookDeliveryConfig {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            message_url: config.message_webhook_url.clone().filter(|u| !u.trim().is_empty()),
            wake_url: config.agent_wake_url.clone().filter(|u| !u.trim().is_empty()),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MessagePayload<'a> {
    channel_type: &'a str,
    channel_id: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WakePayload<'a> {
    agent_role_id: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    http: Client,
    config: WebhookDeliveryConfig,
}

impl WebhookDelivery {
    pub fn new(config: WebhookDeliveryConfig) -> DomainResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("hookwise/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DomainError::ExecutionFailed(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    async fn post<T: Serialize + Sync>(&self, what: &str, url: Option<&str>, body: &T) -> DomainResult<()> {
        let url = url.ok_or_else(|| DomainError::ExecutionFailed(format!("No endpoint configured for {what}")))?;

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::ExecutionFailed(format!("{what} request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body_text = resp.text().await.unwrap_or_default();
            return Err(DomainError::ExecutionFailed(format!(
                "{what} returned {status}: {}",
                body_text.chars().take(200).collect::<String>()
            )));
        }

        tracing::debug!(endpoint = url, what, "delivery succeeded");
        Ok(())
    }
}

#[async_trait]
impl ChannelDelivery for WebhookDelivery {
    async fn send_message(&self, channel_type: &str, channel_id: &str, message: &str) -> DomainResult<()> {
        let payload = MessagePayload { channel_type, channel_id, message };
        self.post("send_message", self.config.message_url.as_deref(), &payload).await
    }
}

#[async_trait]
impl AgentWaker for WebhookDelivery {
    async fn wake_agent(&self, agent_role_id: &str, prompt: &str) -> DomainResult<()> {
        let payload = WakePayload { agent_role_id, prompt };
        self.post("wake_agent", self.config.wake_url.as_deref(), &payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn delivery(server: &Server) -> WebhookDelivery {
        WebhookDelivery::new(WebhookDeliveryConfig {
            message_url: Some(format!("{}/messages", server.url())),
            wake_url: Some(format!("{}/wake", server.url())),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_message_posts_payload() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/messages")
            .match_body(Matcher::Json(json!({
                "channelType": "slack",
                "channelId": "C1",
                "message": "invoice arrived"
            })))
            .with_status(200)
            .create_async()
            .await;

        delivery(&server)
            .send_message("slack", "C1", "invoice arrived")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_wake_agent_non_success_is_error() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/wake")
            .with_status(503)
            .with_body("busy")
            .create_async()
            .await;

        let err = delivery(&server).wake_agent("ops", "look").await.unwrap_err();
        assert!(matches!(err, DomainError::ExecutionFailed(msg) if msg.contains("503")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_endpoint_is_error() {
        let delivery = WebhookDelivery::new(WebhookDeliveryConfig::from(&DeliveryConfig::default())).unwrap();
        let err = delivery.send_message("slack", "C1", "hi").await.unwrap_err();
        assert!(matches!(err, DomainError::ExecutionFailed(msg) if msg.contains("No endpoint")));
    }
}
