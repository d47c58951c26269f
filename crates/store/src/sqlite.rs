//! SQLite-backed cache backend using sqlx.
//!
//! Schema: `cache_entries(key TEXT PRIMARY KEY, value_json TEXT, expires_at INTEGER)`,
//! with `expires_at` in epoch milliseconds.

use crate::cache::{CacheBackend, CacheEntry};
use async_trait::async_trait;
use copilink_types::{CopilotError, traits::Result};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;

/// A persistent [`CacheBackend`] backed by `SQLite`.
pub struct SqliteCacheBackend {
    pool: SqlitePool,
}

impl SqliteCacheBackend {
    /// Connects to a `SQLite` database (e.g. `"sqlite:./credentials.db"`).
    ///
    /// Creates the database file and the table if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`sqlx::Error`] if the connection or table creation fails.
    pub async fn new(database_url: &str) -> std::result::Result<Self, sqlx::Error> {
        let opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                key         TEXT    PRIMARY KEY,
                value_json  TEXT    NOT NULL,
                expires_at  INTEGER NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl CacheBackend for SqliteCacheBackend {
    async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT value_json, expires_at FROM cache_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            None => Ok(None),
            Some((json, expires_at)) => {
                let value =
                    serde_json::from_str(&json).map_err(|e| CopilotError::Storage(e.to_string()))?;
                Ok(Some(CacheEntry {
                    key: key.to_string(),
                    value,
                    expires_at_millis: u64::try_from(expires_at).unwrap_or(0),
                }))
            }
        }
    }

    async fn store(&self, entry: CacheEntry) -> Result<()> {
        let json =
            serde_json::to_string(&entry.value).map_err(|e| CopilotError::Storage(e.to_string()))?;
        sqlx::query(
            "INSERT INTO cache_entries (key, value_json, expires_at)
             VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                 value_json = excluded.value_json,
                 expires_at = excluded.expires_at",
        )
        .bind(&entry.key)
        .bind(&json)
        .bind(i64::try_from(entry.expires_at_millis).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
