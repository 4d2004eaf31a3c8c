//! Bounded cache entry manager
//!
//! Owns the serialized window of recent messages stored under one
//! conversation key.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::error::{ChatError, Result};
use crate::key::ConversationKey;
use crate::message::Message;

/// Outcome of reading a conversation entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    Hit(Vec<Message>),
    /// Absent or expired
    Miss,
    /// Payload did not decode; the entry has already been deleted
    Corrupted,
}

pub struct CacheEntryManager {
    cache: Arc<dyn CacheStore>,
    window: usize,
}

impl CacheEntryManager {
    pub fn new(cache: Arc<dyn CacheStore>, window: usize) -> Self {
        Self {
            cache,
            window: window.max(1),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Read the entry for `key`. Undecodable payloads are removed and
    /// reported as [`CacheLookup::Corrupted`].
    pub async fn lookup(&self, key: &ConversationKey) -> Result<CacheLookup> {
        let Some(raw) = self.cache.get(key.as_str()).await? else {
            return Ok(CacheLookup::Miss);
        };

        match serde_json::from_slice::<Vec<Message>>(&raw) {
            Ok(messages) => Ok(CacheLookup::Hit(self.bounded(messages))),
            Err(e) => {
                let err = ChatError::CacheCorrupted {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                warn!(error = %err, "Clearing corrupted cache entry");
                self.cache.delete(key.as_str()).await?;
                Ok(CacheLookup::Corrupted)
            }
        }
    }

    /// Cached sequence for `key`; `None` on miss, expiry or corruption.
    pub async fn get(&self, key: &ConversationKey) -> Result<Option<Vec<Message>>> {
        match self.lookup(key).await? {
            CacheLookup::Hit(messages) => Ok(Some(messages)),
            CacheLookup::Miss | CacheLookup::Corrupted => Ok(None),
        }
    }

    /// Replace the entry with the last `window` messages of `messages`.
    pub async fn put(&self, key: &ConversationKey, messages: Vec<Message>, ttl: Duration) -> Result<()> {
        let messages = self.bounded(messages);
        self.write(key, &messages, ttl).await
    }

    /// Append `message` to the entry, seeding an absent entry from
    /// `fallback`. Returns the entry as stored: oldest first, at most
    /// `window` messages, holding `message` exactly once unless it is older
    /// than the whole window.
    pub async fn append<F, Fut>(
        &self,
        key: &ConversationKey,
        message: Message,
        ttl: Duration,
        fallback: F,
    ) -> Result<Vec<Message>>
    where
        F: FnOnce(&ConversationKey) -> Fut,
        Fut: Future<Output = Result<Vec<Message>>>,
    {
        let mut messages = match self.lookup(key).await? {
            CacheLookup::Hit(messages) => messages,
            CacheLookup::Miss | CacheLookup::Corrupted => {
                debug!(key = %key, "Seeding cache entry from durable store");
                fallback(key).await?
            }
        };

        // A backfill taken after the message was persisted already holds it,
        // possibly followed by newer messages from a concurrent send
        if !messages.iter().any(|m| m.id == message.id) {
            let at = messages.partition_point(|m| m.created_at <= message.created_at);
            messages.insert(at, message);
        }

        let messages = self.bounded(messages);
        self.write(key, &messages, ttl).await?;
        Ok(messages)
    }

    pub async fn invalidate(&self, key: &ConversationKey) -> Result<()> {
        self.cache.delete(key.as_str()).await
    }

    fn bounded(&self, mut messages: Vec<Message>) -> Vec<Message> {
        if messages.len() > self.window {
            messages.drain(..messages.len() - self.window);
        }
        messages
    }

    async fn write(&self, key: &ConversationKey, messages: &[Message], ttl: Duration) -> Result<()> {
        let payload = serde_json::to_vec(messages)
            .map_err(|e| ChatError::CacheUnavailable(format!("encode {}: {}", key, e)))?;
        self.cache.set(key.as_str(), Bytes::from(payload), ttl).await
    }
}
