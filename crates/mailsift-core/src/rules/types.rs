use serde::{Deserialize, Serialize};

use crate::emails::FieldName;

/// How a rule combines its condition results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Aggregation {
    #[serde(alias = "all", alias = "ALL")]
    All,
    #[serde(alias = "any", alias = "ANY")]
    Any,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregation::All => "All",
            Aggregation::Any => "Any",
        }
    }

    /// Whether `matched` of `total` conditions is enough for the rule to fire.
    pub fn fires(&self, matched: usize, total: usize) -> bool {
        match self {
            Aggregation::All => matched == total,
            Aggregation::Any => matched > 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub field: FieldName,
    pub predicate: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    #[serde(rename = "predicate")]
    pub aggregation: Aggregation,
    pub conditions: Vec<Condition>,
    pub actions: Vec<String>,
}

/// Rules in declaration order. Every rule is evaluated against every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Rule> {
        self.rules.iter()
    }
}

impl<'a> IntoIterator for &'a RuleSet {
    type Item = &'a Rule;
    type IntoIter = std::slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}
