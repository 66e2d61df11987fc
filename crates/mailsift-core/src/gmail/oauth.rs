use std::convert::Infallible;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
pub const DEFAULT_REFRESH_BUFFER: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl OAuthTokens {
    pub fn needs_refresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now + buffer >= self.expires_at
    }
}

/// Everything the Gmail client needs to authenticate. Loaded once and handed
/// to `GmailClient::new`; nothing reads it from disk implicitly afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub oauth: OAuthTokens,
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("failed to read credentials from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write credentials to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid credentials json: {0}")]
    Decode(#[from] serde_json::Error),
}

impl Credentials {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let body = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| CredentialsError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), CredentialsError> {
        let path = path.as_ref();
        let body = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, body)
            .await
            .map_err(|source| CredentialsError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("missing refresh token")]
    MissingRefreshToken,
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("token response decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("token endpoint error {status}: {body}")]
    TokenEndpoint { status: u16, body: String },
    #[error("invalid expires_in value: {0}")]
    InvalidExpires(i64),
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn save_tokens(&self, tokens: &OAuthTokens) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Default)]
pub struct NoopTokenStore;

#[async_trait]
impl TokenStore for NoopTokenStore {
    type Error = Infallible;

    async fn save_tokens(&self, _tokens: &OAuthTokens) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Writes refreshed tokens back into the credentials file they came from.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
    client_id: String,
    client_secret: String,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>, credentials: &Credentials) -> Self {
        Self {
            path: path.into(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    type Error = CredentialsError;

    async fn save_tokens(&self, tokens: &OAuthTokens) -> Result<(), Self::Error> {
        let credentials = Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            oauth: tokens.clone(),
        };
        credentials.save(&self.path).await
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

pub async fn refresh_access_token(
    client: &reqwest::Client,
    client_id: &str,
    client_secret: &str,
    tokens: &OAuthTokens,
    endpoint: &str,
) -> Result<OAuthTokens, OAuthError> {
    if tokens.refresh_token.is_empty() {
        return Err(OAuthError::MissingRefreshToken);
    }

    let form = [
        ("grant_type", "refresh_token"),
        ("client_id", client_id),
        ("client_secret", client_secret),
        ("refresh_token", tokens.refresh_token.as_str()),
    ];
    let response = client.post(endpoint).form(&form).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(OAuthError::TokenEndpoint {
            status: status.as_u16(),
            body,
        });
    }

    let RefreshResponse {
        access_token,
        expires_in,
        refresh_token,
    } = serde_json::from_str(&body)?;
    if expires_in <= 0 {
        return Err(OAuthError::InvalidExpires(expires_in));
    }

    Ok(OAuthTokens {
        access_token,
        // Only present when Google rotates it.
        refresh_token: refresh_token.unwrap_or_else(|| tokens.refresh_token.clone()),
        expires_at: Utc::now() + Duration::seconds(expires_in),
    })
}
