use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::types::RuleSet;

#[derive(Debug, Error)]
pub enum RuleConfigError {
    #[error("failed to read rules from {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid rule document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("rule at index {index} has no conditions")]
    EmptyConditions { index: usize },
    #[error("rule at index {index} has no actions")]
    EmptyActions { index: usize },
}

/// Parses a rule document. Predicate and action names are not checked here;
/// they are classified when a record is evaluated (see `check_rule_set` for an
/// up-front report).
pub fn load_rule_set(source: &str) -> Result<RuleSet, RuleConfigError> {
    let rule_set: RuleSet = serde_json::from_str(source)?;

    for (index, rule) in rule_set.iter().enumerate() {
        if rule.conditions.is_empty() {
            return Err(RuleConfigError::EmptyConditions { index });
        }
        if rule.actions.is_empty() {
            return Err(RuleConfigError::EmptyActions { index });
        }
    }

    debug!(rules = rule_set.len(), "loaded rule set");
    Ok(rule_set)
}

pub fn load_rule_set_from_path(path: impl AsRef<Path>) -> Result<RuleSet, RuleConfigError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|source| RuleConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_rule_set(&source)
}
