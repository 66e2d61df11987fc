use thiserror::Error;
use tracing::{debug, info};

use crate::emails::{EmailStoreError, RecordStore};
use crate::gmail::{GmailClient, GmailClientError, TokenStore, parse_email_record};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to list messages in {label}: {source}")]
    List {
        label: String,
        source: GmailClientError,
    },
    #[error("failed to fetch message {message_id}: {source}")]
    Fetch {
        message_id: String,
        source: GmailClientError,
    },
    #[error("failed to store message: {0}")]
    Store(#[from] EmailStoreError),
}

/// Ids of the messages carrying `label`, newest first as Gmail returns them.
/// Only the first page is read.
pub async fn fetch_message_ids<S: TokenStore>(
    client: &GmailClient<S>,
    label: &str,
) -> Result<Vec<String>, IngestError> {
    let response = client
        .list_messages_in_label(label)
        .await
        .map_err(|source| IngestError::List {
            label: label.to_string(),
            source,
        })?;

    let ids: Vec<String> = response.messages.into_iter().map(|m| m.id).collect();
    debug!(label, count = ids.len(), "listed messages");
    Ok(ids)
}

/// Fetches the headers of the first `limit` messages and upserts them into the
/// store. Returns how many records were written.
pub async fn save_messages<S: TokenStore>(
    client: &GmailClient<S>,
    store: &dyn RecordStore,
    ids: &[String],
    limit: usize,
) -> Result<usize, IngestError> {
    let mut saved = 0;
    for message_id in ids.iter().take(limit) {
        let message = client
            .get_message_metadata(message_id)
            .await
            .map_err(|source| IngestError::Fetch {
                message_id: message_id.clone(),
                source,
            })?;

        let record = parse_email_record(&message);
        store.upsert(&record).await?;
        debug!(message_id = %record.id, subject = %record.subject, "cached message");
        saved += 1;
    }

    info!(saved, available = ids.len(), "saved messages");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::emails::{EmailRecord, EmailRepository};
    use crate::gmail::{Credentials, NoopTokenStore, OAuthTokens};
    use crate::migrations::run_migrations;
    use chrono::{Duration, Utc};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GmailClient<NoopTokenStore> {
        let credentials = Credentials {
            client_id: "client".into(),
            client_secret: "secret".into(),
            oauth: OAuthTokens {
                access_token: "access".into(),
                refresh_token: "refresh".into(),
                expires_at: Utc::now() + Duration::hours(1),
            },
        };
        GmailClient::new(
            reqwest::Client::new(),
            "me",
            credentials,
            Arc::new(NoopTokenStore),
        )
        .with_api_base(format!("{}/gmail/v1/users", server.uri()))
    }

    async fn setup_store() -> (EmailRepository, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let db = Database::new(&dir.path().join("cache.sqlite"))
            .await
            .expect("create db");
        run_migrations(&db).await.expect("migrations");
        (EmailRepository::new(db), dir)
    }

    fn metadata_response(id: &str, subject: &str) -> serde_json::Value {
        json!({
            "id": id,
            "threadId": format!("thr-{id}"),
            "labelIds": ["INBOX", "UNREAD"],
            "payload": {
                "mimeType": "text/plain",
                "headers": [
                    {"name": "From", "value": "Alice <alice@example.com>"},
                    {"name": "To", "value": "bob@example.com"},
                    {"name": "Subject", "value": subject},
                    {"name": "Date", "value": "Mon, 10 Jun 2024 09:30:00 +0000"}
                ]
            }
        })
    }

    async fn mount_message(server: &MockServer, id: &str, subject: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/gmail/v1/users/me/messages/{id}")))
            .and(query_param("format", "metadata"))
            .respond_with(ResponseTemplate::new(200).set_body_json(metadata_response(id, subject)))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn fetch_message_ids_lists_label() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .and(query_param("labelIds", "INBOX"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "messages": [
                    {"id": "m3", "threadId": "t3"},
                    {"id": "m2", "threadId": "t2"},
                    {"id": "m1", "threadId": "t1"}
                ],
                "resultSizeEstimate": 3
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ids = fetch_message_ids(&client(&server), "INBOX")
            .await
            .expect("list ids");
        assert_eq!(ids, vec!["m3", "m2", "m1"]);
    }

    #[tokio::test]
    async fn empty_label_yields_no_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"resultSizeEstimate": 0})))
            .mount(&server)
            .await;

        let ids = fetch_message_ids(&client(&server), "INBOX")
            .await
            .expect("list ids");
        assert!(ids.is_empty());
    }

    #[tokio::test]
    async fn save_messages_stores_first_n_with_raw_headers() {
        let server = MockServer::start().await;
        mount_message(&server, "m1", "First").await;
        mount_message(&server, "m2", "Second").await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/m3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(metadata_response("m3", "Third")))
            .expect(0)
            .mount(&server)
            .await;

        let (store, _dir) = setup_store().await;
        let ids = vec!["m1".to_string(), "m2".to_string(), "m3".to_string()];
        let saved = save_messages(&client(&server), &store, &ids, 2)
            .await
            .expect("save");

        assert_eq!(saved, 2);
        assert_eq!(store.count().await.expect("count"), 2);
        assert_eq!(
            store.get("m1").await.expect("get"),
            Some(EmailRecord {
                id: "m1".into(),
                from_address: "Alice <alice@example.com>".into(),
                to_address: "bob@example.com".into(),
                subject: "First".into(),
                date_received: "Mon, 10 Jun 2024 09:30:00 +0000".into(),
            })
        );
        assert!(store.get("m3").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn save_messages_updates_existing_records() {
        let server = MockServer::start().await;
        mount_message(&server, "m1", "Edited").await;

        let (store, _dir) = setup_store().await;
        store
            .upsert(&EmailRecord {
                id: "m1".into(),
                from_address: "old@example.com".into(),
                to_address: "bob@example.com".into(),
                subject: "Original".into(),
                date_received: "Sun, 09 Jun 2024 09:30:00 +0000".into(),
            })
            .await
            .expect("seed");

        let ids = vec!["m1".to_string()];
        save_messages(&client(&server), &store, &ids, 10)
            .await
            .expect("save");

        let stored = store.get("m1").await.expect("get").expect("present");
        assert_eq!(stored.subject, "Edited");
        assert_eq!(store.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn fetch_failure_names_the_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gmail/v1/users/me/messages/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (store, _dir) = setup_store().await;
        let ids = vec!["gone".to_string()];
        let err = save_messages(&client(&server), &store, &ids, 10)
            .await
            .expect_err("404 fails");
        match err {
            IngestError::Fetch { message_id, .. } => assert_eq!(message_id, "gone"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
