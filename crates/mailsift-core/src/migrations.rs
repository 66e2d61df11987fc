use std::collections::HashSet;

use chrono::{SecondsFormat, Utc};
use libsql::{Connection, params};
use thiserror::Error;
use tracing::info;

use crate::db::{Database, DbError};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    version: "001_emails",
    sql: include_str!("../../../migrations/001_emails.sql"),
}];

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error("migration failed: {0}")]
    LibSql(#[from] libsql::Error),
}

const CREATE_LEDGER: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

async fn applied_versions(conn: &Connection) -> Result<HashSet<String>, MigrationError> {
    let mut versions = HashSet::new();
    let mut rows = conn.query("SELECT version FROM schema_migrations", ()).await?;
    while let Some(row) = rows.next().await? {
        versions.insert(row.get::<String>(0)?);
    }
    Ok(versions)
}

/// Runs one migration and its ledger entry in a single transaction.
async fn apply_one(conn: &Connection, migration: &Migration) -> Result<(), MigrationError> {
    let applied_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let tx = conn.transaction().await?;
    tx.execute_batch(migration.sql).await?;
    tx.execute(
        "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        params![migration.version, applied_at],
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

async fn apply_migrations(conn: &Connection, migrations: &[Migration]) -> Result<usize, MigrationError> {
    conn.execute(CREATE_LEDGER, ()).await?;
    let applied = applied_versions(conn).await?;

    let pending = migrations
        .iter()
        .filter(|migration| !applied.contains(migration.version));
    let mut count = 0;
    for migration in pending {
        apply_one(conn, migration).await?;
        info!(version = migration.version, "applied migration");
        count += 1;
    }
    Ok(count)
}

/// Bring the email cache schema up to date. Returns how many migrations ran.
pub async fn run_migrations(db: &Database) -> Result<usize, MigrationError> {
    let conn = db.connection()?;
    apply_migrations(&conn, MIGRATIONS).await
}
