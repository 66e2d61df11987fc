use std::{path::Path, sync::Arc};

use libsql::{Builder, Connection, Database as LibSqlDatabase};
use thiserror::Error;

/// Handle to the local email cache. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    inner: Arc<LibSqlDatabase>,
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: String,
        source: libsql::Error,
    },
    #[error("failed to open connection: {0}")]
    Connect(libsql::Error),
    #[error("failed to create database directory: {0}")]
    CreateDir(std::io::Error),
}

impl Database {
    pub async fn new(database_path: &Path) -> Result<Self, DbError> {
        let path_str = database_path.to_string_lossy().to_string();
        if path_str != ":memory:" {
            if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(DbError::CreateDir)?;
            }
        }

        let inner = Builder::new_local(path_str.clone())
            .build()
            .await
            .map_err(|source| DbError::Open {
                path: path_str,
                source,
            })?;

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn connection(&self) -> Result<Connection, DbError> {
        self.inner.connect().map_err(DbError::Connect)
    }
}
