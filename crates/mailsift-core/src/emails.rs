use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use libsql::{Row, params};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{Database, DbError};

const EMAIL_COLUMNS: &str = "id, from_email, to_email, subject, date_received";

/// Cached metadata for one message. `date_received` keeps the raw `Date`
/// header value; it is only parsed when a date condition needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: String,
    pub from_address: String,
    pub to_address: String,
    pub subject: String,
    pub date_received: String,
}

impl EmailRecord {
    pub fn field(&self, name: FieldName) -> &str {
        match name {
            FieldName::Id => &self.id,
            FieldName::FromAddress => &self.from_address,
            FieldName::ToAddress => &self.to_address,
            FieldName::Subject => &self.subject,
            FieldName::DateReceived => &self.date_received,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Id,
    #[serde(rename = "from_email", alias = "from_address")]
    FromAddress,
    #[serde(rename = "to_email", alias = "to_address")]
    ToAddress,
    Subject,
    DateReceived,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Id => "id",
            FieldName::FromAddress => "from_email",
            FieldName::ToAddress => "to_email",
            FieldName::Subject => "subject",
            FieldName::DateReceived => "date_received",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldName::DateReceived => FieldKind::Date,
            _ => FieldKind::String,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Date,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Date => "date",
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum EmailStoreError {
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error("sql error: {0}")]
    Sql(#[from] libsql::Error),
}

/// Persisted email cache consumed by the processor and filled by ingestion.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All cached records, in insertion order.
    async fn list_all(&self) -> Result<Vec<EmailRecord>, EmailStoreError>;

    async fn upsert(&self, record: &EmailRecord) -> Result<(), EmailStoreError>;
}

#[derive(Clone)]
pub struct EmailRepository {
    db: Database,
}

impl EmailRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn get(&self, id: &str) -> Result<Option<EmailRecord>, EmailStoreError> {
        let conn = self.db.connection()?;
        let mut rows = conn
            .query(
                &format!("SELECT {EMAIL_COLUMNS} FROM emails WHERE id = ?1"),
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn count(&self) -> Result<u64, EmailStoreError> {
        let conn = self.db.connection()?;
        let mut rows = conn.query("SELECT COUNT(*) FROM emails", ()).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl RecordStore for EmailRepository {
    async fn list_all(&self) -> Result<Vec<EmailRecord>, EmailStoreError> {
        let conn = self.db.connection()?;
        let mut rows = conn
            .query(
                &format!("SELECT {EMAIL_COLUMNS} FROM emails ORDER BY rowid"),
                (),
            )
            .await?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }

    async fn upsert(&self, record: &EmailRecord) -> Result<(), EmailStoreError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let conn = self.db.connection()?;
        conn.execute(
            "INSERT INTO emails (id, from_email, to_email, subject, date_received, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
             ON CONFLICT(id) DO UPDATE SET
                from_email = excluded.from_email,
                to_email = excluded.to_email,
                subject = excluded.subject,
                date_received = excluded.date_received,
                updated_at = excluded.updated_at",
            params![
                record.id.as_str(),
                record.from_address.as_str(),
                record.to_address.as_str(),
                record.subject.as_str(),
                record.date_received.as_str(),
                now
            ],
        )
        .await?;
        Ok(())
    }
}

fn row_to_record(row: &Row) -> Result<EmailRecord, EmailStoreError> {
    Ok(EmailRecord {
        id: row.get(0)?,
        from_address: row.get(1)?,
        to_address: row.get(2)?,
        subject: row.get(3)?,
        date_received: row.get(4)?,
    })
}
