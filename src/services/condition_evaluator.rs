//! Default structured condition matcher for trigger rules.

use regex::RegexBuilder;
use serde_json::Value;

use crate::domain::models::{ConditionLogic, ConditionOperator, TriggerCondition, TriggerEvent};
use crate::domain::ports::{ConditionError, ConditionEvaluator};

/// Matches `{field, op, value}` clauses against an event's field bag.
///
/// `field` is a dotted path; `source` resolves to the event source unless the
/// bag has its own `source` field. String comparisons ignore case. A missing
/// field fails every operator except `not_equals`, `not_contains` and `not_exists`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldConditionEvaluator;

impl FieldConditionEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn evaluate_one(&self, event: &TriggerEvent, condition: &TriggerCondition) -> Result<bool, ConditionError> {
        let source_value;
        let actual = match event.lookup(&condition.field) {
            Some(v) => Some(v),
            None if condition.field == "source" => {
                source_value = Value::String(event.source.clone());
                Some(&source_value)
            }
            None => None,
        };
        let expected = &condition.value;

        let matched = match condition.op {
            ConditionOperator::Exists => actual.is_some_and(|v| !v.is_null()),
            ConditionOperator::NotExists => actual.is_none_or(Value::is_null),
            ConditionOperator::Equals => actual.is_some_and(|v| values_equal(v, expected)),
            ConditionOperator::NotEquals => !actual.is_some_and(|v| values_equal(v, expected)),
            ConditionOperator::Contains => actual.is_some_and(|v| contains(v, expected)),
            ConditionOperator::NotContains => !actual.is_some_and(|v| contains(v, expected)),
            ConditionOperator::StartsWith => {
                actual.is_some_and(|v| as_text(v).starts_with(&as_text(expected)))
            }
            ConditionOperator::EndsWith => actual.is_some_and(|v| as_text(v).ends_with(&as_text(expected))),
            ConditionOperator::Matches => {
                let pattern = expected.as_str().map_or_else(|| expected.to_string(), str::to_string);
                let re = RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ConditionError::InvalidPattern {
                        field: condition.field.clone(),
                        reason: e.to_string(),
                    })?;
                actual.is_some_and(|v| re.is_match(&raw_text(v)))
            }
            ConditionOperator::Gt | ConditionOperator::Gte | ConditionOperator::Lt | ConditionOperator::Lte => {
                let Some(actual) = actual else {
                    return Ok(false);
                };
                let lhs = as_number(actual).ok_or_else(|| ConditionError::NotNumeric {
                    field: condition.field.clone(),
                    value: raw_text(actual),
                })?;
                let rhs = as_number(expected).ok_or_else(|| ConditionError::NotNumeric {
                    field: condition.field.clone(),
                    value: raw_text(expected),
                })?;
                match condition.op {
                    ConditionOperator::Gt => lhs > rhs,
                    ConditionOperator::Gte => lhs >= rhs,
                    ConditionOperator::Lt => lhs < rhs,
                    _ => lhs <= rhs,
                }
            }
        };
        Ok(matched)
    }
}

impl ConditionEvaluator for FieldConditionEvaluator {
    fn evaluate(
        &self,
        event: &TriggerEvent,
        conditions: &[TriggerCondition],
        logic: ConditionLogic,
    ) -> Result<bool, ConditionError> {
        if conditions.is_empty() {
            return Ok(true);
        }
        match logic {
            ConditionLogic::All => {
                for condition in conditions {
                    if !self.evaluate_one(event, condition)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            ConditionLogic::Any => {
                for condition in conditions {
                    if self.evaluate_one(event, condition)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

/// Strings verbatim, everything else as compact JSON.
fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_text(value: &Value) -> String {
    raw_text(value).to_lowercase()
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    if let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) {
        return a == b;
    }
    as_text(actual) == as_text(expected)
}

fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| values_equal(item, expected)),
        other => as_text(other).contains(&as_text(expected)),
    }
}
