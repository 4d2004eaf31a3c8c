//! Cache storage substrate
//!
//! Expiring key/value store consumed by the entry manager. Expiry is enforced
//! by the substrate itself; nothing in this crate sweeps entries actively.

mod lumadb;
mod memory;

pub use lumadb::LumaDbCacheStore;
pub use memory::MemoryCacheStore;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use crate::error::Result;

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Value stored under `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Store `value`, replacing any previous one and restarting expiry.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// All live keys starting with `prefix`.
    async fn keys(&self, prefix: &str) -> Result<Vec<String>>;

    async fn is_healthy(&self) -> bool {
        true
    }
}

/// Delete every key under `namespace`. Returns the number of keys removed.
///
/// Operational tool; not used on the request path.
pub async fn flush_namespace(cache: &dyn CacheStore, namespace: &str) -> Result<usize> {
    let keys = cache.keys(namespace).await?;
    info!(namespace, count = keys.len(), "Flushing cache keys");

    for key in &keys {
        cache.delete(key).await?;
        debug!(key = %key, "Deleted cache key");
    }

    Ok(keys.len())
}
