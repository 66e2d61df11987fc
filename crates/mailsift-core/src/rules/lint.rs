use std::fmt;
use std::str::FromStr;

use crate::actions::Action;
use crate::emails::FieldKind;

use super::predicates::{DatePredicate, PredicateError, StringPredicate, parse_age};
use super::types::RuleSet;

/// A problem found by checking a rule set without any records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleIssue {
    pub rule_index: usize,
    pub problem: RuleProblem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleProblem {
    Condition {
        condition_index: usize,
        field: &'static str,
        source: PredicateError,
    },
    Action { action_index: usize, name: String },
}

impl fmt::Display for RuleIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            RuleProblem::Condition {
                condition_index,
                field,
                source,
            } => write!(
                f,
                "rule {} condition {} ({}): {}",
                self.rule_index, condition_index, field, source
            ),
            RuleProblem::Action { action_index, name } => write!(
                f,
                "rule {} action {}: {} - invalid action",
                self.rule_index, action_index, name
            ),
        }
    }
}

/// Checks predicate names, date targets and action names up front. Problems
/// listed here would otherwise fail every record the rule is evaluated for.
pub fn check_rule_set(rule_set: &RuleSet) -> Vec<RuleIssue> {
    let mut issues = Vec::new();

    for (rule_index, rule) in rule_set.iter().enumerate() {
        for (condition_index, condition) in rule.conditions.iter().enumerate() {
            let checked = match condition.field.kind() {
                FieldKind::String => StringPredicate::parse(&condition.predicate).map(|_| ()),
                FieldKind::Date => DatePredicate::parse(&condition.predicate)
                    .and_then(|_| parse_age(&condition.value))
                    .map(|_| ()),
            };
            if let Err(source) = checked {
                issues.push(RuleIssue {
                    rule_index,
                    problem: RuleProblem::Condition {
                        condition_index,
                        field: condition.field.as_str(),
                        source,
                    },
                });
            }
        }

        for (action_index, name) in rule.actions.iter().enumerate() {
            if Action::from_str(name).is_err() {
                issues.push(RuleIssue {
                    rule_index,
                    problem: RuleProblem::Action {
                        action_index,
                        name: name.clone(),
                    },
                });
            }
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::loader::load_rule_set;

    #[test]
    fn clean_rule_set_has_no_issues() {
        let rules = load_rule_set(
            r#"[{"predicate": "All", "conditions": [
                {"field": "from_email", "predicate": "contains", "value": "@example.com"},
                {"field": "date_received", "predicate": "less_than", "value": "2 months"}
            ], "actions": ["mark_as_read", "move_to_starred"]}]"#,
        )
        .expect("rules load");
        assert!(check_rule_set(&rules).is_empty());
    }

    #[test]
    fn reports_every_problem_with_its_position() {
        let rules = load_rule_set(
            r#"[
                {"predicate": "All", "conditions": [{"field": "subject", "predicate": "equals", "value": "x"}], "actions": ["mark_as_read"]},
                {"predicate": "Any", "conditions": [
                    {"field": "subject", "predicate": "matches", "value": "x"},
                    {"field": "date_received", "predicate": "less_than", "value": "3 weeks"}
                ], "actions": ["mark_as_read", "archive"]}
            ]"#,
        )
        .expect("rules load");

        let issues = check_rule_set(&rules);
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|issue| issue.rule_index == 1));

        assert!(matches!(
            &issues[0].problem,
            RuleProblem::Condition {
                condition_index: 0,
                field: "subject",
                source: PredicateError::InvalidPredicate { .. },
            }
        ));
        assert!(matches!(
            &issues[1].problem,
            RuleProblem::Condition {
                condition_index: 1,
                source: PredicateError::InvalidTargetUnit { .. },
                ..
            }
        ));
        assert_eq!(
            issues[2].problem,
            RuleProblem::Action {
                action_index: 1,
                name: "archive".into(),
            }
        );
        assert_eq!(
            issues[2].to_string(),
            "rule 1 action 1: archive - invalid action"
        );
    }
}
