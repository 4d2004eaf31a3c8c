//! In-process cache substrate

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use super::CacheStore;
use crate::error::Result;

/// Writes between two full expiry sweeps
const SWEEP_EVERY: u64 = 256;

struct CachedValue {
    value: Bytes,
    expires_at: Instant,
}

impl CachedValue {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// DashMap-backed substrate.
///
/// Expired values are dropped when read, on every key listing, and by a full
/// sweep every `SWEEP_EVERY` writes, so keys that are never read again do
/// not pile up.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, CachedValue>,
    writes: AtomicU64,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently held, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live());
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_live() => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| !entry.is_live());
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let expires_at = Instant::now() + ttl;
        self.entries
            .insert(key.to_string(), CachedValue { value, expires_at });

        if self.writes.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            let purged = self.purge_expired();
            if purged > 0 {
                debug!(purged, "Purged expired cache entries");
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.purge_expired();
        Ok(self
            .entries
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = MemoryCacheStore::new();
        store
            .set("chat:messages:a:b", Bytes::from_static(b"[]"), Duration::from_secs(60))
            .await
            .unwrap();

        let value = store.get("chat:messages:a:b").await.unwrap();
        assert_eq!(value, Some(Bytes::from_static(b"[]")));
    }

    #[tokio::test]
    async fn test_zero_ttl_is_expired() {
        let store = MemoryCacheStore::new();
        store
            .set("k", Bytes::from_static(b"v"), Duration::ZERO)
            .await
            .unwrap();

        assert!(store.get("k").await.unwrap().is_none());
        assert!(store.keys("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_overwrites_and_refreshes() {
        let store = MemoryCacheStore::new();
        store
            .set("k", Bytes::from_static(b"old"), Duration::ZERO)
            .await
            .unwrap();
        store
            .set("k", Bytes::from_static(b"new"), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some(Bytes::from_static(b"new")));
    }

    #[tokio::test]
    async fn test_keys_filters_by_prefix() {
        let store = MemoryCacheStore::new();
        let ttl = Duration::from_secs(60);
        store.set("chat:messages:a:b", Bytes::new(), ttl).await.unwrap();
        store.set("chat:messages:c:d", Bytes::new(), ttl).await.unwrap();
        store.set("session:a", Bytes::new(), ttl).await.unwrap();

        let mut keys = store.keys("chat:messages:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["chat:messages:a:b", "chat:messages:c:d"]);
    }

    #[tokio::test]
    async fn test_keys_reclaims_expired_entries() {
        let store = MemoryCacheStore::new();
        for i in 0..1000 {
            store
                .set(&format!("chat:messages:u{i}:v{i}"), Bytes::new(), Duration::ZERO)
                .await
                .unwrap();
        }

        assert!(store.keys("chat:messages:").await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_writes_sweep_unread_expired_entries() {
        let store = MemoryCacheStore::new();
        for i in 0..SWEEP_EVERY {
            store
                .set(&format!("stale:{i}"), Bytes::new(), Duration::ZERO)
                .await
                .unwrap();
        }

        // Never read and never listed, still reclaimed by the write path
        assert!(store.is_empty());

        store
            .set("live", Bytes::from_static(b"v"), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("live").await.unwrap(), Some(Bytes::from_static(b"v")));
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryCacheStore::new();
        store
            .set("k", Bytes::from_static(b"v"), Duration::from_secs(60))
            .await
            .unwrap();
        store.delete("k").await.unwrap();
        store.delete("missing").await.unwrap();

        assert!(store.get("k").await.unwrap().is_none());
    }
}
