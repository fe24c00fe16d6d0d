//! SQLite-backed session records

use super::record::{SessionRecord, SessionRecordStore, SessionRecordUpdate};
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, error, info};

/// Session records in the `sessions` table
#[derive(Debug, Clone)]
pub struct SqliteSessionRecordStore {
    pool: SqlitePool,
}

impl SqliteSessionRecordStore {
    /// Create the store, creating the table if needed
    pub async fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.create_tables().await?;
        Ok(store)
    }

    async fn create_tables(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                expires INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create sessions table: {}", e);
            StoreError::Database(e)
        })?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires)")
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to create sessions index: {}", e);
                StoreError::Database(e)
            })?;

        info!("Sessions table ready");
        Ok(())
    }
}

#[async_trait]
impl SessionRecordStore for SqliteSessionRecordStore {
    async fn create(
        &self,
        id: &str,
        payload: &str,
        expires_at: i64,
    ) -> Result<SessionRecord, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO sessions (id, payload, expires)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                payload = excluded.payload,
                expires = excluded.expires
            "#,
        )
        .bind(id)
        .bind(payload)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to write session record: {}", e);
            StoreError::Database(e)
        })?;

        Ok(SessionRecord {
            id: id.to_string(),
            payload: payload.to_string(),
            expires_at,
        })
    }

    async fn read(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        sqlx::query_as::<_, SessionRecord>(
            "SELECT id, payload, expires FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to read session record: {}", e);
            StoreError::Database(e)
        })
    }

    async fn update(&self, id: &str, update: SessionRecordUpdate) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET payload = COALESCE(?, payload),
                expires = COALESCE(?, expires)
            WHERE id = ?
            "#,
        )
        .bind(update.payload)
        .bind(update.expires_at)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to update session record: {}", e);
            StoreError::Database(e)
        })?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to delete session record: {}", e);
                StoreError::Database(e)
            })?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires < ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to purge expired sessions: {}", e);
                StoreError::Database(e)
            })?;

        debug!("Purged {} expired session records", result.rows_affected());
        Ok(result.rows_affected())
    }
}
