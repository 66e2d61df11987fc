use thiserror::Error;
use tracing::{info, warn};

use crate::actions::{Action, ActionExecutor, UnknownAction, parse_actions};
use crate::emails::{EmailRecord, EmailStoreError, RecordStore};
use crate::labels::{LabelService, RemoteServiceError};
use crate::rules::{EvaluationContext, PredicateError, RuleSet, evaluate_rule};

/// Why a single record was skipped. The run continues with the next record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error(transparent)]
    Predicate(#[from] PredicateError),
    #[error("{0} - invalid action")]
    InvalidAction(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub record_id: String,
    pub rule_index: usize,
    pub error: RecordError,
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("run aborted: {0}")]
    Remote(#[from] RemoteServiceError),
    #[error("failed to read records: {0}")]
    Store(#[from] EmailStoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub records: usize,
    pub rules_fired: usize,
    pub mutations: usize,
    pub skipped: usize,
    pub failures: Vec<RecordFailure>,
}

impl ProcessReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Runs a rule set over records and applies the actions of every rule that
/// fires, one record at a time.
pub struct Processor<L> {
    rule_set: RuleSet,
    executor: ActionExecutor<L>,
}

impl<L: LabelService> Processor<L> {
    pub fn new(rule_set: RuleSet, executor: ActionExecutor<L>) -> Self {
        Self { rule_set, executor }
    }

    /// Snapshots the store once, then processes the snapshot.
    pub async fn process_store(
        &self,
        store: &dyn RecordStore,
    ) -> Result<ProcessReport, ProcessError> {
        let records = store.list_all().await?;
        self.process_all(&records).await
    }

    pub async fn process_all(&self, records: &[EmailRecord]) -> Result<ProcessReport, ProcessError> {
        self.process_all_at(records, &EvaluationContext::new()).await
    }

    pub async fn process_all_at(
        &self,
        records: &[EmailRecord],
        ctx: &EvaluationContext,
    ) -> Result<ProcessReport, ProcessError> {
        let mut report = ProcessReport::default();

        for record in records {
            report.records += 1;

            let (fired, actions) = match self.plan(record, ctx) {
                Ok(plan) => plan,
                Err(failure) => {
                    warn!(
                        message_id = %failure.record_id,
                        rule_index = failure.rule_index,
                        error = %failure.error,
                        "skipping record"
                    );
                    report.failures.push(failure);
                    continue;
                }
            };

            report.rules_fired += fired;
            if actions.is_empty() {
                continue;
            }

            let outcome = self.executor.apply(record, &actions).await?;
            report.mutations += outcome.mutations;
            report.skipped += outcome.skipped;
        }

        info!(
            records = report.records,
            rules_fired = report.rules_fired,
            mutations = report.mutations,
            failures = report.failures.len(),
            "processed records"
        );
        Ok(report)
    }

    /// Evaluates every rule and classifies the actions of those that fire.
    /// Nothing remote happens here, so a failure leaves the record untouched.
    fn plan(
        &self,
        record: &EmailRecord,
        ctx: &EvaluationContext,
    ) -> Result<(usize, Vec<Action>), RecordFailure> {
        let failure = |rule_index: usize, error: RecordError| RecordFailure {
            record_id: record.id.clone(),
            rule_index,
            error,
        };

        let mut fired = Vec::new();
        for (rule_index, rule) in self.rule_set.iter().enumerate() {
            match evaluate_rule(record, rule, ctx) {
                Ok(true) => fired.push((rule_index, rule)),
                Ok(false) => {}
                Err(err) => return Err(failure(rule_index, err.into())),
            }
        }

        let mut actions = Vec::new();
        for (rule_index, rule) in &fired {
            match parse_actions(&rule.actions) {
                Ok(parsed) => actions.extend(parsed),
                Err(UnknownAction(name)) => {
                    return Err(failure(*rule_index, RecordError::InvalidAction(name)));
                }
            }
        }

        Ok((fired.len(), actions))
    }
}
