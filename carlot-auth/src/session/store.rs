//! get/set/destroy capability consumed by the session middleware

use super::data::SessionData;
use super::record::SessionRecordStore;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

/// Pluggable session store
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// `None` for unknown or expired sessions
    async fn get(&self, id: &str) -> Result<Option<SessionData>, StoreError>;

    /// Create or replace the session stored under `id`
    async fn set(&self, id: &str, data: &SessionData) -> Result<(), StoreError>;

    /// Remove the session; unknown ids are not an error
    async fn destroy(&self, id: &str) -> Result<(), StoreError>;
}

/// Write-through adapter over a [`SessionRecordStore`]. No caching.
#[derive(Clone)]
pub struct PersistentSessionStore {
    records: Arc<dyn SessionRecordStore>,
    fallback_lifetime: Duration,
}

impl PersistentSessionStore {
    /// `fallback_lifetime` is used for sessions whose cookie carries no expiry
    pub fn new(records: Arc<dyn SessionRecordStore>, fallback_lifetime: Duration) -> Self {
        Self {
            records,
            fallback_lifetime,
        }
    }

    /// Remove records nobody asked for again
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        self.records.purge_expired(Utc::now().timestamp()).await
    }
}

#[async_trait]
impl SessionStore for PersistentSessionStore {
    async fn get(&self, id: &str) -> Result<Option<SessionData>, StoreError> {
        let Some(record) = self.records.read(id).await? else {
            return Ok(None);
        };

        if record.expires_at < Utc::now().timestamp() {
            debug!("Session record is past its expiry");
            return Ok(None);
        }

        match serde_json::from_str(&record.payload) {
            Ok(data) => Ok(Some(data)),
            Err(e) => {
                warn!("Discarding unreadable session payload: {}", e);
                Ok(None)
            }
        }
    }

    async fn set(&self, id: &str, data: &SessionData) -> Result<(), StoreError> {
        let expires_at = data
            .expires_at()
            .unwrap_or_else(|| {
                Utc::now()
                    .checked_add_signed(self.fallback_lifetime)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC)
            })
            .timestamp();
        let payload = serde_json::to_string(data)?;

        self.records.create(id, &payload, expires_at).await?;
        Ok(())
    }

    async fn destroy(&self, id: &str) -> Result<(), StoreError> {
        self.records.delete(id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::data::SessionCookie;
    use crate::session::record::MemorySessionRecordStore;

    fn adapter() -> (PersistentSessionStore, MemorySessionRecordStore) {
        let records = MemorySessionRecordStore::new();
        let store = PersistentSessionStore::new(Arc::new(records.clone()), Duration::hours(1));
        (store, records)
    }

    #[tokio::test]
    async fn test_missing_cookie_expiry_uses_fallback_lifetime() {
        let (store, records) = adapter();
        let data = SessionData::default();

        store.set("plain", &data).await.unwrap();

        let record = records.read("plain").await.unwrap().unwrap();
        assert!(record.expires_at > Utc::now().timestamp() + 3500);
        assert_eq!(store.get("plain").await.unwrap(), Some(data));
    }

    #[tokio::test]
    async fn test_expiry_taken_from_cookie() {
        let (store, records) = adapter();
        let expires = Utc::now() + Duration::minutes(5);
        let data = SessionData::new(SessionCookie {
            expires: Some(expires),
            ..Default::default()
        });

        store.set("c", &data).await.unwrap();
        let record = records.read("c").await.unwrap().unwrap();
        assert_eq!(record.expires_at, expires.timestamp());
    }

    #[tokio::test]
    async fn test_corrupt_payload_reads_as_absent() {
        let (store, records) = adapter();
        records
            .create("bad", "not json", Utc::now().timestamp() + 60)
            .await
            .unwrap();

        assert!(store.get("bad").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_through_adapter() {
        let (store, records) = adapter();
        records.create("old", "{}", 1).await.unwrap();

        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(records.is_empty().await);
    }
}
