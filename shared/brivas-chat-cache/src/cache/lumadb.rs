//! LumaDB key/value cache table

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, instrument, warn};

use super::CacheStore;
use crate::error::{ChatError, Result};
use crate::lumadb::LumaDbPool;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS chat_cache (
        key        TEXT PRIMARY KEY,
        value      BYTEA NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )
"#;

const PURGE_EXPIRED: &str = "DELETE FROM chat_cache WHERE expires_at <= NOW()";

/// Writes between two expired-row purges
const PURGE_EVERY: u64 = 1024;

/// Cache substrate stored in a LumaDB table.
///
/// Expiry is evaluated against the server clock. Expired rows are invisible
/// to reads and are deleted before every key listing and every
/// `PURGE_EVERY` writes.
#[derive(Clone)]
pub struct LumaDbCacheStore {
    pool: LumaDbPool,
    writes: Arc<AtomicU64>,
}

impl LumaDbCacheStore {
    pub fn new(pool: LumaDbPool) -> Self {
        Self {
            pool,
            writes: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Delete every expired row. Returns the number of rows removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let client = self.client().await?;
        let purged = client.execute(PURGE_EXPIRED, &[]).await.map_err(unavailable)?;
        if purged > 0 {
            debug!(purged, "Purged expired cache rows");
        }
        Ok(purged)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        let client = self.client().await?;
        client.batch_execute(CREATE_TABLE).await.map_err(unavailable)?;
        debug!("chat_cache table ready");
        Ok(())
    }

    async fn client(&self) -> Result<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| ChatError::CacheUnavailable(e.to_string()))
    }
}

fn unavailable(err: tokio_postgres::Error) -> ChatError {
    ChatError::CacheUnavailable(err.to_string())
}

#[async_trait]
impl CacheStore for LumaDbCacheStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT value FROM chat_cache WHERE key = $1 AND expires_at > NOW()",
                &[&key],
            )
            .await
            .map_err(unavailable)?;

        Ok(row.map(|row| Bytes::from(row.get::<_, Vec<u8>>("value"))))
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        let client = self.client().await?;
        let value: &[u8] = &value;
        let ttl_secs = ttl.as_secs_f64();
        client
            .execute(
                r#"
                INSERT INTO chat_cache (key, value, expires_at)
                VALUES ($1, $2, NOW() + make_interval(secs => $3))
                ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
                "#,
                &[&key, &value, &ttl_secs],
            )
            .await
            .map_err(unavailable)?;
        drop(client);

        if self.writes.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            if let Err(e) = self.purge_expired().await {
                warn!(error = %e, "Failed to purge expired cache rows");
            }
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let client = self.client().await?;
        client
            .execute("DELETE FROM chat_cache WHERE key = $1", &[&key])
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.purge_expired().await?;
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT key FROM chat_cache \
                 WHERE left(key, char_length($1)) = $1 AND expires_at > NOW()",
                &[&prefix],
            )
            .await
            .map_err(unavailable)?;

        Ok(rows.iter().map(|row| row.get("key")).collect())
    }

    async fn is_healthy(&self) -> bool {
        self.pool.is_healthy().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lumadb::PoolConfig;

    fn unreachable_store() -> LumaDbCacheStore {
        let pool = LumaDbPool::new(&PoolConfig {
            url: "postgres://brivas@127.0.0.1:1/brivas".to_string(),
            max_size: 1,
        })
        .unwrap();
        LumaDbCacheStore::new(pool)
    }

    #[test]
    fn test_purge_targets_only_expired_rows() {
        assert!(PURGE_EXPIRED.starts_with("DELETE FROM chat_cache"));
        assert!(PURGE_EXPIRED.ends_with("expires_at <= NOW()"));
    }

    #[tokio::test]
    async fn test_purge_failure_is_cache_fault() {
        let store = unreachable_store();

        let err = store.purge_expired().await.unwrap_err();
        assert!(err.is_cache_fault());
        assert!(matches!(
            store.keys("chat:messages:").await,
            Err(ChatError::CacheUnavailable(_))
        ));
    }
}
