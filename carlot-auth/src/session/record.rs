//! Session record persistence contract and an in-memory implementation

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Persisted session row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlite", derive(sqlx::FromRow))]
pub struct SessionRecord {
    pub id: String,
    /// Serialized session payload (JSON)
    pub payload: String,
    /// Unix seconds
    #[cfg_attr(feature = "sqlite", sqlx(rename = "expires"))]
    pub expires_at: i64,
}

/// Fields to replace on an existing record; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionRecordUpdate {
    pub payload: Option<String>,
    pub expires_at: Option<i64>,
}

/// Single-row operations over session records keyed by id.
///
/// `create` on an existing id replaces the stored row.
#[async_trait]
pub trait SessionRecordStore: Send + Sync {
    async fn create(
        &self,
        id: &str,
        payload: &str,
        expires_at: i64,
    ) -> Result<SessionRecord, StoreError>;

    /// `None` when no row exists
    async fn read(&self, id: &str) -> Result<Option<SessionRecord>, StoreError>;

    /// Returns the number of rows changed
    async fn update(&self, id: &str, update: SessionRecordUpdate) -> Result<u64, StoreError>;

    /// Returns the number of rows removed
    async fn delete(&self, id: &str) -> Result<u64, StoreError>;

    /// Remove every row with `expires_at < now`
    async fn purge_expired(&self, now: i64) -> Result<u64, StoreError>;
}

/// Process-local record store
#[derive(Debug, Clone, Default)]
pub struct MemorySessionRecordStore {
    records: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemorySessionRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionRecordStore for MemorySessionRecordStore {
    async fn create(
        &self,
        id: &str,
        payload: &str,
        expires_at: i64,
    ) -> Result<SessionRecord, StoreError> {
        let record = SessionRecord {
            id: id.to_string(),
            payload: payload.to_string(),
            expires_at,
        };
        self.records
            .write()
            .await
            .insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn read(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, update: SessionRecordUpdate) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(id) else {
            return Ok(0);
        };

        if let Some(payload) = update.payload {
            record.payload = payload;
        }
        if let Some(expires_at) = update.expires_at {
            record.expires_at = expires_at;
        }
        Ok(1)
    }

    async fn delete(&self, id: &str) -> Result<u64, StoreError> {
        Ok(u64::from(self.records.write().await.remove(id).is_some()))
    }

    async fn purge_expired(&self, now: i64) -> Result<u64, StoreError> {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| record.expires_at >= now);
        let purged = (before - records.len()) as u64;
        debug!("Purged {} expired session records", purged);
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_overwrites() {
        let store = MemorySessionRecordStore::new();
        store.create("a", "{}", 10).await.unwrap();
        store.create("a", r#"{"jwt":"x"}"#, 20).await.unwrap();

        let record = store.read("a").await.unwrap().unwrap();
        assert_eq!(record.payload, r#"{"jwt":"x"}"#);
        assert_eq!(record.expires_at, 20);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_partial_update() {
        let store = MemorySessionRecordStore::new();
        store.create("a", "{}", 10).await.unwrap();

        let changed = store
            .update(
                "a",
                SessionRecordUpdate {
                    expires_at: Some(99),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(changed, 1);

        let record = store.read("a").await.unwrap().unwrap();
        assert_eq!(record.payload, "{}");
        assert_eq!(record.expires_at, 99);

        let missing = store
            .update("nope", SessionRecordUpdate::default())
            .await
            .unwrap();
        assert_eq!(missing, 0);
    }

    #[tokio::test]
    async fn test_delete_and_purge() {
        let store = MemorySessionRecordStore::new();
        store.create("old", "{}", 5).await.unwrap();
        store.create("edge", "{}", 10).await.unwrap();
        store.create("new", "{}", 50).await.unwrap();

        assert_eq!(store.purge_expired(10).await.unwrap(), 1);
        assert!(store.read("old").await.unwrap().is_none());
        assert!(store.read("edge").await.unwrap().is_some());

        assert_eq!(store.delete("new").await.unwrap(), 1);
        assert_eq!(store.delete("new").await.unwrap(), 0);
    }
}
