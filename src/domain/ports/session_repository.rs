//! Repository port for idempotency records and session locks.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::DomainResult;
use crate::domain::models::{HookSessionRecord, SessionLock};

/// Durable session-key → task mapping plus TTL advisory locks.
///
/// Keys are trimmed; an empty key is a no-op reporting `None`/`false`.
#[async_trait]
pub trait HookSessionRepository: Send + Sync {
    /// Look up the mapping for a session key.
    async fn find_by_session_key(&self, key: &str) -> DomainResult<Option<HookSessionRecord>>;

    /// Insert-or-ignore a mapping. Returns true iff this call's insert won.
    async fn create(&self, key: &str, task_id: &str) -> DomainResult<bool>;

    /// Try to take the lock for a key. Expired lock rows are cleaned up first.
    /// Returns true iff this call's insert won.
    async fn acquire_lock(&self, key: &str, ttl: Duration) -> DomainResult<bool>;

    /// Drop the lock for a key. Idempotent.
    async fn release_lock(&self, key: &str) -> DomainResult<()>;

    /// The lock currently held on a key, ignoring expired rows.
    async fn find_lock(&self, key: &str) -> DomainResult<Option<SessionLock>>;
}
