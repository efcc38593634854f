//! Outbound delivery for `send_message` and `wake_agent` trigger actions.

pub mod webhook;

pub use webhook::{WebhookDelivery, WebhookDeliveryConfig};
