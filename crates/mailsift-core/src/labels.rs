use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::gmail::{GmailClient, GmailClientError, ModifyMessageRequest, TokenStore};

pub const UNREAD: &str = "UNREAD";
pub const STARRED: &str = "STARRED";
pub const IMPORTANT: &str = "IMPORTANT";
pub const SPAM: &str = "SPAM";
pub const CATEGORY_SOCIAL: &str = "CATEGORY_SOCIAL";
pub const INBOX: &str = "INBOX";

/// A failed call to the remote label service. Label state is not assumed
/// consistent afterwards, so callers abort the run.
#[derive(Debug, Error)]
pub enum RemoteServiceError {
    #[error("gmail request for message {message_id} failed: {source}")]
    Gmail {
        message_id: String,
        source: GmailClientError,
    },
    #[error("label service error for message {message_id}: {reason}")]
    Service { message_id: String, reason: String },
}

/// Remote label state keyed by message id.
#[async_trait]
pub trait LabelService: Send + Sync {
    async fn get_labels(&self, message_id: &str) -> Result<HashSet<String>, RemoteServiceError>;

    async fn add_label(&self, message_id: &str, label: &str) -> Result<(), RemoteServiceError>;

    async fn remove_label(&self, message_id: &str, label: &str) -> Result<(), RemoteServiceError>;
}

#[async_trait]
impl<T: LabelService + ?Sized> LabelService for Arc<T> {
    async fn get_labels(&self, message_id: &str) -> Result<HashSet<String>, RemoteServiceError> {
        (**self).get_labels(message_id).await
    }

    async fn add_label(&self, message_id: &str, label: &str) -> Result<(), RemoteServiceError> {
        (**self).add_label(message_id, label).await
    }

    async fn remove_label(&self, message_id: &str, label: &str) -> Result<(), RemoteServiceError> {
        (**self).remove_label(message_id, label).await
    }
}

fn gmail_error(message_id: &str) -> impl FnOnce(GmailClientError) -> RemoteServiceError + '_ {
    move |source| RemoteServiceError::Gmail {
        message_id: message_id.to_string(),
        source,
    }
}

#[async_trait]
impl<S: TokenStore + 'static> LabelService for GmailClient<S> {
    async fn get_labels(&self, message_id: &str) -> Result<HashSet<String>, RemoteServiceError> {
        let message = self
            .get_message_minimal(message_id)
            .await
            .map_err(gmail_error(message_id))?;
        Ok(message.label_ids.into_iter().collect())
    }

    async fn add_label(&self, message_id: &str, label: &str) -> Result<(), RemoteServiceError> {
        self.modify_message(message_id, &ModifyMessageRequest::add(label))
            .await
            .map_err(gmail_error(message_id))?;
        Ok(())
    }

    async fn remove_label(&self, message_id: &str, label: &str) -> Result<(), RemoteServiceError> {
        self.modify_message(message_id, &ModifyMessageRequest::remove(label))
            .await
            .map_err(gmail_error(message_id))?;
        Ok(())
    }
}
