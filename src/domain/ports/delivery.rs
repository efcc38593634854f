//! Ports for outbound channel delivery and agent wake-ups.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;

/// Delivers a message to an external channel. Errors mean the message was not delivered.
#[async_trait]
pub trait ChannelDelivery: Send + Sync {
    async fn send_message(&self, channel_type: &str, channel_id: &str, message: &str) -> DomainResult<()>;
}

/// Wakes an agent role with a prompt.
#[async_trait]
pub trait AgentWaker: Send + Sync {
    async fn wake_agent(&self, agent_role_id: &str, prompt: &str) -> DomainResult<()>;
}
