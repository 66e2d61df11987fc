use serde::Deserialize;
use std::{env, path::Path, path::PathBuf};
use thiserror::Error;

pub const DEFAULT_GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    pub app: AppConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub gmail: GmailConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    pub service_name: String,
    pub env: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PathsConfig {
    pub database: PathBuf,
    pub rules: PathBuf,
    pub credentials: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GmailConfig {
    #[serde(default = "default_user_id")]
    pub user_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_fetch_label")]
    pub fetch_label: String,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            user_id: default_user_id(),
            api_base: default_api_base(),
            fetch_label: default_fetch_label(),
            fetch_limit: default_fetch_limit(),
        }
    }
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_api_base() -> String {
    DEFAULT_GMAIL_API_BASE.to_string()
}

fn default_fetch_label() -> String {
    "INBOX".to_string()
}

fn default_fetch_limit() -> usize {
    10
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file: {0}")]
    ConfigBuild(config::ConfigError),
    #[error("failed to parse configuration: {0}")]
    Deserialize(config::ConfigError),
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),
    #[error("invalid MAILSIFT_FETCH_LIMIT override: {0}")]
    InvalidFetchLimit(std::num::ParseIntError),
}

impl Config {
    /// Load configuration from the provided path, apply environment overrides, and
    /// resolve any `env:` indirections.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()
            .map_err(ConfigError::ConfigBuild)?;

        let mut cfg: Config = raw.try_deserialize().map_err(ConfigError::Deserialize)?;
        cfg.apply_env_overrides()?;
        cfg.resolve_env_markers()?;
        cfg.expand_paths();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(database) = env::var("MAILSIFT_DATABASE") {
            self.paths.database = PathBuf::from(database);
        }

        if let Ok(rules) = env::var("MAILSIFT_RULES") {
            self.paths.rules = PathBuf::from(rules);
        }

        if let Ok(limit) = env::var("MAILSIFT_FETCH_LIMIT") {
            self.gmail.fetch_limit = limit.parse().map_err(ConfigError::InvalidFetchLimit)?;
        }

        Ok(())
    }

    fn resolve_env_markers(&mut self) -> Result<(), ConfigError> {
        apply_env_marker(&mut self.app.service_name)?;
        apply_env_marker(&mut self.app.env)?;
        apply_env_marker(&mut self.gmail.user_id)?;
        apply_env_marker(&mut self.gmail.api_base)?;
        apply_env_marker(&mut self.gmail.fetch_label)?;
        apply_env_marker_path(&mut self.paths.database)?;
        apply_env_marker_path(&mut self.paths.rules)?;
        apply_env_marker_path(&mut self.paths.credentials)?;
        Ok(())
    }

    fn expand_paths(&mut self) {
        for path in [
            &mut self.paths.database,
            &mut self.paths.rules,
            &mut self.paths.credentials,
        ] {
            let raw = path.to_string_lossy().to_string();
            let expanded = shellexpand::tilde(&raw);
            *path = PathBuf::from(expanded.as_ref());
        }
    }
}

fn apply_env_marker(value: &mut String) -> Result<(), ConfigError> {
    if let Some(rest) = value.strip_prefix("env:") {
        let resolved = env::var(rest).map_err(|_| ConfigError::MissingEnvVar(rest.to_string()))?;
        *value = resolved;
    }
    Ok(())
}

fn apply_env_marker_path(path: &mut PathBuf) -> Result<(), ConfigError> {
    let mut value = path.to_string_lossy().to_string();
    apply_env_marker(&mut value)?;
    *path = PathBuf::from(value);
    Ok(())
}
