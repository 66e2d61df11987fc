use std::sync::Arc;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::DEFAULT_GMAIL_API_BASE;
use crate::gmail::{
    oauth::{
        Credentials, DEFAULT_REFRESH_BUFFER, OAuthError, OAuthTokens, TOKEN_ENDPOINT, TokenStore,
        refresh_access_token,
    },
    types::{ListMessagesResponse, Message, ModifyMessageRequest},
};

/// Headers requested when caching message metadata.
pub const METADATA_HEADERS: [&str; 4] = ["From", "To", "Subject", "Date"];

#[derive(Debug, Error)]
pub enum GmailClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("oauth error: {0}")]
    OAuth(#[from] OAuthError),
    #[error("token persistence error: {0}")]
    TokenStore(String),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unauthorized after refresh")]
    Unauthorized,
}

pub struct GmailClient<S: TokenStore> {
    http: Client,
    user_id: String,
    client_id: String,
    client_secret: String,
    api_base: String,
    token_endpoint: String,
    tokens: RwLock<OAuthTokens>,
    token_store: Arc<S>,
}

impl<S: TokenStore> GmailClient<S> {
    pub fn new(
        http: Client,
        user_id: impl Into<String>,
        credentials: Credentials,
        token_store: Arc<S>,
    ) -> Self {
        Self {
            http,
            user_id: user_id.into(),
            client_id: credentials.client_id,
            client_secret: credentials.client_secret,
            api_base: DEFAULT_GMAIL_API_BASE.to_string(),
            token_endpoint: TOKEN_ENDPOINT.to_string(),
            tokens: RwLock::new(credentials.oauth),
            token_store,
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    pub fn with_token_endpoint(mut self, token_endpoint: impl Into<String>) -> Self {
        self.token_endpoint = token_endpoint.into();
        self
    }

    /// Lists message ids carrying `label_id` (first page only).
    pub async fn list_messages_in_label(
        &self,
        label_id: &str,
    ) -> Result<ListMessagesResponse, GmailClientError> {
        let url = format!("{}/{}/messages", self.api_base, self.user_id);
        self.send_json(|| self.http.get(&url).query(&[("labelIds", label_id)]))
            .await
    }

    /// Fetches a message with only the cached headers in its payload.
    pub async fn get_message_metadata(
        &self,
        message_id: &str,
    ) -> Result<Message, GmailClientError> {
        let url = format!("{}/{}/messages/{}", self.api_base, self.user_id, message_id);
        self.send_json(|| {
            let mut builder = self.http.get(&url).query(&[("format", "metadata")]);
            for header in METADATA_HEADERS {
                builder = builder.query(&[("metadataHeaders", header)]);
            }
            builder
        })
        .await
    }

    /// Fetches the message id and label ids only.
    pub async fn get_message_minimal(&self, message_id: &str) -> Result<Message, GmailClientError> {
        let url = format!("{}/{}/messages/{}", self.api_base, self.user_id, message_id);
        self.send_json(|| self.http.get(&url).query(&[("format", "minimal")]))
            .await
    }

    pub async fn modify_message(
        &self,
        message_id: &str,
        request: &ModifyMessageRequest,
    ) -> Result<Message, GmailClientError> {
        let url = format!(
            "{}/{}/messages/{}/modify",
            self.api_base, self.user_id, message_id
        );
        debug!(
            message_id,
            add = ?request.add_label_ids,
            remove = ?request.remove_label_ids,
            "modifying gmail labels"
        );
        self.send_json(|| self.http.post(&url).json(request)).await
    }

    /// Exchanges the refresh token for a new access token and persists it
    /// through the token store. The write lock is held for the whole exchange,
    /// so concurrent callers wait for one refresh instead of racing.
    pub async fn refresh(&self) -> Result<OAuthTokens, GmailClientError> {
        let mut tokens = self.tokens.write().await;
        let refreshed = refresh_access_token(
            &self.http,
            &self.client_id,
            &self.client_secret,
            &tokens,
            &self.token_endpoint,
        )
        .await?;

        self.token_store
            .save_tokens(&refreshed)
            .await
            .map_err(|err| GmailClientError::TokenStore(err.to_string()))?;

        *tokens = refreshed.clone();
        debug!(expires_at = %refreshed.expires_at, "refreshed gmail access token");
        Ok(refreshed)
    }

    pub async fn current_tokens(&self) -> OAuthTokens {
        self.tokens.read().await.clone()
    }

    /// Access token for the next request, refreshed first when it is about
    /// to expire.
    async fn access_token(&self) -> Result<String, GmailClientError> {
        {
            let tokens = self.tokens.read().await;
            if !tokens.needs_refresh(Utc::now(), DEFAULT_REFRESH_BUFFER) {
                return Ok(tokens.access_token.clone());
            }
        }
        Ok(self.refresh().await?.access_token)
    }

    /// Sends the request built by `build` with bearer auth and decodes the
    /// JSON body. A 401 triggers one refresh and one resend.
    async fn send_json<T, B>(&self, build: B) -> Result<T, GmailClientError>
    where
        T: DeserializeOwned,
        B: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let token = self.access_token().await?;
        let mut response = build().bearer_auth(&token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("gmail rejected access token, refreshing");
            let token = self.refresh().await?.access_token;
            response = build().bearer_auth(&token).send().await?;
            if response.status() == StatusCode::UNAUTHORIZED {
                return Err(GmailClientError::Unauthorized);
            }
        }

        let body = response.error_for_status()?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}
