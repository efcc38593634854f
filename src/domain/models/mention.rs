//! Mention records pulled from the external feed and the commands parsed out of them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Canonical form of one upstream mention, whatever shape it arrived in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirdMentionRecord {
    pub tweet_id: String,
    pub conversation_id: Option<String>,
    /// Lowercase, without a leading `@`.
    pub author: String,
    pub text: String,
    pub url: String,
    /// Best-effort creation time; falls back to the time of parsing.
    pub timestamp: DateTime<Utc>,
    pub raw: Value,
}

/// A mention accepted by the command parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedMentionCommand {
    #[serde(flatten)]
    pub mention: BirdMentionRecord,
    /// Text after the prefix, original casing preserved.
    pub command: String,
}

/// Why a mention was not turned into a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MentionRejectReason {
    MissingId,
    MissingAuthor,
    NotAllowlisted,
    MissingPrefix,
    EmptyCommand,
}

impl MentionRejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingId => "missing-id",
            Self::MissingAuthor => "missing-author",
            Self::NotAllowlisted => "not-allowlisted",
            Self::MissingPrefix => "missing-prefix",
            Self::EmptyCommand => "empty-command",
        }
    }
}

impl fmt::Display for MentionRejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which authors may issue commands and how commands are introduced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionTriggerSettings {
    /// Command prefix, matched case-insensitively at a token boundary.
    pub prefix: String,
    /// Allowed authors; compared case-insensitively with `@` stripped.
    pub allowlist: Vec<String>,
}

impl Default for MentionTriggerSettings {
    fn default() -> Self {
        Self {
            prefix: "do:".to_string(),
            allowlist: Vec::new(),
        }
    }
}

/// Lowercase and strip a leading `@` from a handle.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_serializes_kebab_case() {
        let json = serde_json::to_value(MentionRejectReason::NotAllowlisted).unwrap();
        assert_eq!(json, "not-allowlisted");
        assert_eq!(MentionRejectReason::EmptyCommand.to_string(), "empty-command");
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle(" @Alice "), "alice");
        assert_eq!(normalize_handle("bob"), "bob");
    }
}
