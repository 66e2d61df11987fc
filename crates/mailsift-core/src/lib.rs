pub mod actions;
pub mod config;
pub mod db;
pub mod emails;
pub mod gmail;
pub mod ingest;
pub mod labels;
pub mod migrations;
pub mod processor;
pub mod rules;
pub mod telemetry;

pub use actions::{Action, ActionError, ActionExecutor, ActionOutcome, UnknownAction};
pub use config::{Config, ConfigError};
pub use db::{Database, DbError};
pub use emails::{EmailRecord, EmailRepository, EmailStoreError, FieldKind, FieldName, RecordStore};
pub use ingest::{IngestError, fetch_message_ids, save_messages};
pub use labels::{LabelService, RemoteServiceError};
pub use processor::{ProcessError, ProcessReport, Processor, RecordError, RecordFailure};
pub use rules::{
    Aggregation, Condition, EvaluationContext, PredicateError, Rule, RuleConfigError, RuleIssue,
    RuleSet, check_rule_set, evaluate_rule, load_rule_set, load_rule_set_from_path,
};
pub use telemetry::{TelemetryError, init_logging};
