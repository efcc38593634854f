//! Domain errors for the hookwise automation core.

use thiserror::Error;
use uuid::Uuid;

/// Domain-level errors that can occur in hookwise.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Trigger not found: {0}")]
    TriggerNotFound(Uuid),

    /// Caller error: empty message, empty session key, malformed trigger input.
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Another caller holds the lock for this session key and never published
    /// a mapping within the wait window. Callers should not retry immediately.
    #[error("Session key is already being processed: {0}")]
    SessionKeyBusy(String),

    #[error("Dependency missing: {0}")]
    DependencyMissing(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl From<sqlx::Error> for DomainError {
    fn from(err: sqlx::Error) -> Self {
        DomainError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::SerializationError(err.to_string())
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::ExecutionFailed(err.to_string())
    }
}
