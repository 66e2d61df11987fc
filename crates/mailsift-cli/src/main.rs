use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mailsift_core::gmail::{Credentials, FileTokenStore, GmailClient};
use mailsift_core::{
    ActionExecutor, Config, Database, EmailRepository, Processor, RuleIssue, check_rule_set,
    fetch_message_ids, init_logging, load_rule_set_from_path, migrations, save_messages,
};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "mailsift")]
#[command(about = "Cache Gmail message headers and apply label rules to them")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "CONFIG_PATH", default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download message headers into the local cache
    Fetch {
        /// Maximum number of messages to store (defaults to gmail.fetch_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Label to list messages from (defaults to gmail.fetch_label)
        #[arg(long)]
        label: Option<String>,
    },
    /// Evaluate the rules against every cached message and apply their actions
    Process,
    /// Report unknown predicates, bad date targets and unknown actions
    CheckRules,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("loading config from {}", cli.config.display()))?;
    init_logging(&config.app)?;

    match cli.command {
        Commands::Fetch { limit, label } => fetch(&config, limit, label).await,
        Commands::Process => process(&config).await,
        Commands::CheckRules => check_rules(&config.paths.rules),
    }
}

async fn open_store(config: &Config) -> Result<EmailRepository> {
    let db = Database::new(&config.paths.database).await?;
    let applied = migrations::run_migrations(&db).await?;
    if applied > 0 {
        info!(applied, "applied database migrations");
    }
    Ok(EmailRepository::new(db))
}

async fn gmail_client(config: &Config) -> Result<GmailClient<FileTokenStore>> {
    let path = &config.paths.credentials;
    let credentials = Credentials::load(path)
        .await
        .with_context(|| format!("loading credentials from {}", path.display()))?;
    let token_store = Arc::new(FileTokenStore::new(path.clone(), &credentials));

    Ok(GmailClient::new(
        reqwest::Client::new(),
        config.gmail.user_id.clone(),
        credentials,
        token_store,
    )
    .with_api_base(config.gmail.api_base.clone()))
}

async fn fetch(config: &Config, limit: Option<usize>, label: Option<String>) -> Result<ExitCode> {
    let store = open_store(config).await?;
    let client = gmail_client(config).await?;
    let label = label.unwrap_or_else(|| config.gmail.fetch_label.clone());
    let limit = limit.unwrap_or(config.gmail.fetch_limit);

    let ids = fetch_message_ids(&client, &label).await?;
    if ids.is_empty() {
        info!(label = %label, "no messages found");
        return Ok(ExitCode::SUCCESS);
    }

    let saved = save_messages(&client, &store, &ids, limit).await?;
    info!(saved, label = %label, "fetch complete");
    Ok(ExitCode::SUCCESS)
}

async fn process(config: &Config) -> Result<ExitCode> {
    let rule_set = load_rule_set_from_path(&config.paths.rules)?;
    for issue in check_rule_set(&rule_set) {
        warn!(%issue, "rule will fail every record it is evaluated for");
    }

    let store = open_store(config).await?;
    let client = gmail_client(config).await?;
    let processor = Processor::new(rule_set, ActionExecutor::new(client));

    let report = processor.process_store(&store).await?;
    for failure in &report.failures {
        error!(
            message_id = %failure.record_id,
            rule_index = failure.rule_index,
            error = %failure.error,
            "record failed"
        );
    }

    info!(
        records = report.records,
        rules_fired = report.rules_fired,
        mutations = report.mutations,
        skipped = report.skipped,
        failures = report.failures.len(),
        "process complete"
    );

    Ok(if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn check_rules(path: &Path) -> Result<ExitCode> {
    let issues = rule_issues(path)?;
    if issues.is_empty() {
        println!("{}: ok", path.display());
        return Ok(ExitCode::SUCCESS);
    }

    for issue in &issues {
        println!("{}: {issue}", path.display());
    }
    Ok(ExitCode::FAILURE)
}

fn rule_issues(path: &Path) -> Result<Vec<RuleIssue>> {
    let rule_set = load_rule_set_from_path(path)
        .with_context(|| format!("loading rules from {}", path.display()))?;
    Ok(check_rule_set(&rule_set))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fetch_overrides() {
        let cli = Cli::try_parse_from([
            "mailsift",
            "--config",
            "/tmp/mailsift.toml",
            "fetch",
            "-n",
            "5",
            "--label",
            "STARRED",
        ])
        .expect("parses");

        assert_eq!(cli.config, PathBuf::from("/tmp/mailsift.toml"));
        match cli.command {
            Commands::Fetch { limit, label } => {
                assert_eq!(limit, Some(5));
                assert_eq!(label.as_deref(), Some("STARRED"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_check_rules_subcommand() {
        let cli = Cli::try_parse_from(["mailsift", "check-rules", "--config", "rules.toml"])
            .expect("parses");
        assert!(matches!(cli.command, Commands::CheckRules));
        assert_eq!(cli.config, PathBuf::from("rules.toml"));
    }

    #[test]
    fn rule_issues_lists_problems_in_rule_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("rules.json");
        fs::write(
            &path,
            r#"[{"predicate": "All", "conditions": [{"field": "subject", "predicate": "matches", "value": "x"}], "actions": ["mark_as_read"]}]"#,
        )
        .expect("write rules");

        let issues = rule_issues(&path).expect("rules load");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].rule_index, 0);
    }

    #[test]
    fn rule_issues_reports_unreadable_file() {
        let dir = TempDir::new().expect("temp dir");
        let err = rule_issues(&dir.path().join("missing.json")).expect_err("missing file");
        assert!(err.to_string().contains("loading rules from"));
    }
}
