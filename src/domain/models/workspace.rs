//! Workspaces tasks run in, including ephemeral per-key temp workspaces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Capabilities granted to agents running inside a workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspacePermissions {
    pub read: bool,
    pub write: bool,
    pub delete: bool,
    pub network: bool,
    pub shell: bool,
}

impl WorkspacePermissions {
    /// Full file and network access with shell execution disabled.
    pub const fn temp_default() -> Self {
        Self {
            read: true,
            write: true,
            delete: true,
            network: true,
            shell: false,
        }
    }
}

impl Default for WorkspacePermissions {
    fn default() -> Self {
        Self::temp_default()
    }
}

/// A workspace row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub path: PathBuf,
    pub is_temp: bool,
    pub permissions: WorkspacePermissions,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Identity of a temp workspace: a scope (`xmention`, `hooks`) and a caller key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TempWorkspaceKey {
    pub scope: String,
    pub key: String,
}

impl TempWorkspaceKey {
    pub fn new(scope: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            key: key.into(),
        }
    }

    /// Deterministic workspace id for this key.
    pub fn workspace_id(&self) -> String {
        format!("temp-{}-{}", sanitize_segment(&self.scope), sanitize_segment(&self.key))
    }

    /// Human-readable workspace name.
    pub fn display_name(&self) -> String {
        format!("Temp {} {}", self.scope.trim(), self.key.trim())
    }
}

const MAX_SEGMENT_LEN: usize = 64;

/// Reduce an arbitrary string to a filesystem- and id-safe segment:
/// lowercase ASCII alphanumerics, `-` and `_`, runs of anything else
/// collapsed to a single `-`, capped at 64 characters.
pub fn sanitize_segment(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len().min(MAX_SEGMENT_LEN));
    let mut last_dash = false;
    for ch in raw.trim().chars() {
        let mapped = if ch.is_ascii_alphanumeric() || ch == '_' {
            Some(ch.to_ascii_lowercase())
        } else {
            None
        };
        match mapped {
            Some(c) => {
                out.push(c);
                last_dash = false;
            }
            None if !last_dash && !out.is_empty() => {
                out.push('-');
                last_dash = true;
            }
            None => {}
        }
        if out.len() >= MAX_SEGMENT_LEN {
            break;
        }
    }
    let trimmed = out.trim_end_matches('-');
    if trimmed.is_empty() {
        "default".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("@Alice"), "alice");
        assert_eq!(sanitize_segment("a/b\\..c"), "a-b-c");
        assert_eq!(sanitize_segment("  "), "default");
        assert_eq!(sanitize_segment("../../etc/passwd"), "etc-passwd");
        assert!(sanitize_segment(&"x".repeat(200)).len() <= 64);
    }

    #[test]
    fn test_workspace_id_is_deterministic() {
        let a = TempWorkspaceKey::new("xmention", "Alice");
        let b = TempWorkspaceKey::new("xmention", "alice");
        assert_eq!(a.workspace_id(), "temp-xmention-alice");
        assert_eq!(a.workspace_id(), b.workspace_id());
    }

    #[test]
    fn test_temp_permissions_disable_shell() {
        let perms = WorkspacePermissions::temp_default();
        assert!(perms.read && perms.write && perms.delete && perms.network);
        assert!(!perms.shell);
    }
}
