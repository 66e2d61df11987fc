pub mod lint;
pub mod loader;
pub mod matcher;
pub mod predicates;
pub mod types;

pub use lint::{RuleIssue, RuleProblem, check_rule_set};
pub use loader::{RuleConfigError, load_rule_set, load_rule_set_from_path};
pub use matcher::{EvaluationContext, evaluate_condition, evaluate_rule};
pub use predicates::{
    DatePredicate, PredicateError, StringPredicate, evaluate_date_predicate,
    evaluate_string_predicate, parse_age, parse_email_date,
};
pub use types::{Aggregation, Condition, Rule, RuleSet};
