//! Port to the external command that lists mentions.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// One fetch invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MentionFetchRequest {
    pub count: u32,
    pub timeout: Duration,
}

/// What the command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum MentionFetchOutput {
    /// Parsed structured output.
    Structured(serde_json::Value),
    /// The command printed plain text where structured output was requested.
    Unstructured(String),
}

/// Failure classes of a fetch. Only [`MentionFetchError::Timeout`] is retried.
#[derive(Debug, Error)]
pub enum MentionFetchError {
    #[error("Mention fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Mention command not installed: {0}")]
    NotInstalled(String),

    #[error("Mention command authentication failed: {0}")]
    Auth(String),

    #[error("Mention command rate limited: {0}")]
    RateLimited(String),

    #[error("Mention command does not support structured output")]
    StructuredOutputUnsupported,

    #[error("Mention command returned malformed output: {0}")]
    MalformedOutput(String),

    #[error("Mention command failed (exit code {code:?}): {stderr}")]
    CommandFailed { code: Option<i32>, stderr: String },

    #[error("Mention command I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MentionFetchError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[async_trait]
pub trait MentionFetcher: Send + Sync {
    /// Whether the external command is available.
    async fn is_installed(&self) -> bool;

    async fn fetch_mentions(
        &self,
        request: MentionFetchRequest,
    ) -> Result<MentionFetchOutput, MentionFetchError>;
}
