//! Schema migrations.
//!
//! Embeds the SQL files in `migrations/` and applies them with `SQLx`'s
//! migrator, which records applied versions in `_sqlx_migrations`.

use crate::error::{Result, StoreError};
use sqlx::{Pool, Sqlite};

/// Run all pending migrations.
///
/// # Errors
/// Returns `StoreError::Migration` if any migration fails to execute.
pub async fn run_migrations(pool: &Pool<Sqlite>) -> Result<()> {
    tracing::info!("Running document store migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| StoreError::Migration(format!("migration execution failed: {e}")))?;

    tracing::info!("Document store migrations completed");
    Ok(())
}

/// Get the current schema version (highest applied migration, 0 if none).
///
/// # Errors
/// Returns `StoreError` if the migrations table cannot be queried.
pub async fn get_schema_version(pool: &Pool<Sqlite>) -> Result<i64> {
    let table_exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?
        > 0;

    if !table_exists {
        return Ok(0);
    }

    let version =
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations")
            .fetch_optional(pool)
            .await?
            .unwrap_or(0);

    Ok(version)
}
