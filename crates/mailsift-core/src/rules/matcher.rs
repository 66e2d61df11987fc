use chrono::{DateTime, Utc};

use crate::emails::{EmailRecord, FieldKind};

use super::predicates::{PredicateError, evaluate_date_predicate, evaluate_string_predicate};
use super::types::{Condition, Rule};

/// Reference time for relative-date conditions. One context is shared by a
/// whole run so every record is judged against the same threshold.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext {
    now: DateTime<Utc>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self { now: Utc::now() }
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}

impl Default for EvaluationContext {
    fn default() -> Self {
        Self::new()
    }
}

pub fn evaluate_condition(
    record: &EmailRecord,
    condition: &Condition,
    ctx: &EvaluationContext,
) -> Result<bool, PredicateError> {
    let value = record.field(condition.field);
    match condition.field.kind() {
        FieldKind::String => evaluate_string_predicate(value, &condition.predicate, &condition.value),
        FieldKind::Date => {
            evaluate_date_predicate(value, &condition.predicate, &condition.value, ctx.now())
        }
    }
}

/// Decides whether `rule` fires for `record`. Every condition is evaluated,
/// so a malformed condition fails the rule even when the outcome is already
/// known.
pub fn evaluate_rule(
    record: &EmailRecord,
    rule: &Rule,
    ctx: &EvaluationContext,
) -> Result<bool, PredicateError> {
    let mut matched = 0;
    for condition in &rule.conditions {
        if evaluate_condition(record, condition, ctx)? {
            matched += 1;
        }
    }
    Ok(rule.aggregation.fires(matched, rule.conditions.len()))
}
