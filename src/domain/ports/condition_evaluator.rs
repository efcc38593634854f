//! Port for evaluating trigger conditions against an event.

use thiserror::Error;

use crate::domain::models::{ConditionLogic, TriggerCondition, TriggerEvent};

/// Errors raised while evaluating a single trigger's conditions.
#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("Invalid pattern for field '{field}': {reason}")]
    InvalidPattern { field: String, reason: String },

    #[error("Field '{field}' is not comparable as a number: {value}")]
    NotNumeric { field: String, value: String },

    #[error("Condition evaluation failed: {0}")]
    Other(String),
}

/// Decides whether an event satisfies a trigger's conditions.
pub trait ConditionEvaluator: Send + Sync {
    fn evaluate(
        &self,
        event: &TriggerEvent,
        conditions: &[TriggerCondition],
        logic: ConditionLogic,
    ) -> Result<bool, ConditionError>;
}
