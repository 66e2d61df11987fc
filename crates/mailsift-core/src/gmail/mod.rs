pub mod client;
pub mod oauth;
pub mod parser;
pub mod types;

pub use client::{GmailClient, GmailClientError, METADATA_HEADERS};
pub use oauth::{
    Credentials, CredentialsError, DEFAULT_REFRESH_BUFFER, FileTokenStore, NoopTokenStore,
    OAuthError, OAuthTokens, TokenStore, refresh_access_token,
};
pub use parser::parse_email_record;
pub use types::*;
