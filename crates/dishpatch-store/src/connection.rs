//! Connection pool management for the document store.

use crate::error::{Result, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Path value that selects an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// `SQLite` connection pool backing the document store.
#[derive(Debug, Clone)]
pub struct StorePool {
    pool: Pool<Sqlite>,
}

impl StorePool {
    /// Open (creating if needed) the database at `path`.
    ///
    /// `:memory:` opens a private in-memory database; its pool is limited to
    /// a single connection so every query sees the same data.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the database cannot be opened.
    pub async fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| {
            StoreError::InvalidArgument("invalid database path: not valid UTF-8".to_string())
        })?;

        let (options, max_connections) = if path_str == IN_MEMORY {
            let options = SqliteConnectOptions::from_str(IN_MEMORY)
                .map_err(|e| StoreError::Unavailable(format!("invalid connection string: {e}")))?;
            (options, 1)
        } else {
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(5));
            (options, max_connections.max(1))
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to open store: {e}")))?;

        tracing::info!("Document store pool created at {}", path_str);

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the connection pool gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Document store pool closed");
    }

    /// Check that the database answers queries.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the database cannot be reached.
    pub async fn verify(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_pool() {
        let pool = StorePool::open(IN_MEMORY, 5).await.expect("open pool");
        pool.verify().await.expect("verify pool");
    }

    #[tokio::test]
    async fn test_file_pool() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let pool = StorePool::open(dir.path().join("store.db"), 2)
            .await
            .expect("open pool");
        pool.verify().await.expect("verify pool");
        assert!(dir.path().join("store.db").exists());
    }

    #[tokio::test]
    async fn test_closed_pool_is_unavailable() {
        let pool = StorePool::open(IN_MEMORY, 1).await.expect("open pool");
        let handle = pool.clone();
        pool.close().await;

        let err = handle.verify().await.expect_err("closed pool");
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
