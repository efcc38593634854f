//! Idempotency records and advisory locks keyed by session key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maps a caller-chosen session key to the task created for it.
///
/// The first insert for a key wins; later inserts are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookSessionRecord {
    pub session_key: String,
    pub task_id: String,
    pub created_at: DateTime<Utc>,
}

/// A short-lived mutual-exclusion claim on a session key.
///
/// Held while a non-expired row exists. `expires_at` only matters when the
/// holder crashed before releasing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLock {
    pub session_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Trim a session key, returning `None` for keys that are empty after trimming.
pub fn normalize_session_key(key: &str) -> Option<&str> {
    let trimmed = key.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_session_key() {
        assert_eq!(normalize_session_key("  xmention:42 "), Some("xmention:42"));
        assert_eq!(normalize_session_key("   "), None);
        assert_eq!(normalize_session_key(""), None);
    }
}
