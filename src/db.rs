//! SQLite connection shared by all feature plugins.
//!
//! `tokio_rusqlite` owns the connection on its own thread; queries are sent
//! to it as closures so request handlers never block the async executor.

use rusqlite::ErrorCode;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database connection error: {0}")]
    Connection(String),
    #[error("cannot create database directory {}: {source}", .path.display())]
    CreateDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => DbError::Sqlite(e),
            other => DbError::Connection(other.to_string()),
        }
    }
}

impl DbError {
    /// If this is a UNIQUE constraint violation, return the offending column.
    ///
    /// SQLite reports these as `UNIQUE constraint failed: <table>.<column>`.
    pub fn unique_violation_field(&self) -> Option<String> {
        let DbError::Sqlite(rusqlite::Error::SqliteFailure(err, msg)) = self else {
            return None;
        };
        if err.code != ErrorCode::ConstraintViolation
            || err.extended_code != rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        {
            return None;
        }
        let msg = msg.as_deref()?;
        let target = msg.strip_prefix("UNIQUE constraint failed: ")?;
        // Composite keys list several columns; report the first one.
        let first = target.split(',').next()?.trim();
        let column = first.rsplit_once('.').map(|(_, c)| c).unwrap_or(first);
        Some(column.to_string())
    }
}

#[derive(Clone)]
pub struct Pool {
    conn: tokio_rusqlite::Connection,
}

impl Pool {
    pub async fn open(path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| DbError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let pool = Self {
            conn: tokio_rusqlite::Connection::open(path).await?,
        };
        pool.run(|conn| conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(())))
            .await?;
        pool.configure().await
    }

    pub async fn open_in_memory() -> Result<Self, DbError> {
        let pool = Self {
            conn: tokio_rusqlite::Connection::open_in_memory().await?,
        };
        pool.configure().await
    }

    async fn configure(self) -> Result<Self, DbError> {
        self.run(|conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.busy_timeout(std::time::Duration::from_secs(3))
        })
        .await?;
        Ok(self)
    }

    /// Run `f` on the connection thread.
    pub(crate) async fn run<T, F>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut rusqlite::Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let result = self
            .conn
            .call(move |conn| f(conn).map_err(tokio_rusqlite::Error::Rusqlite))
            .await?;
        Ok(result)
    }
}
