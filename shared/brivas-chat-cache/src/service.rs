//! Cache-backed read and write paths for direct conversations

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::cache::{flush_namespace, CacheStore};
use crate::entry::{CacheEntryManager, CacheLookup};
use crate::error::{ChatError, Result};
use crate::key::{normalize, KEY_NAMESPACE};
use crate::message::{Message, NewMessage};
use crate::notify::Notifier;
use crate::settings::CacheSettings;
use crate::store::MessageStore;

/// Conversation service
///
/// The durable store is authoritative; the cache only saves store round
/// trips. Cache faults are logged and absorbed, store faults surface.
pub struct ConversationService {
    store: Arc<dyn MessageStore>,
    cache: Arc<dyn CacheStore>,
    entries: CacheEntryManager,
    notifier: Arc<dyn Notifier>,
    settings: CacheSettings,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        cache: Arc<dyn CacheStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self::with_settings(store, cache, notifier, CacheSettings::default())
    }

    pub fn with_settings(
        store: Arc<dyn MessageStore>,
        cache: Arc<dyn CacheStore>,
        notifier: Arc<dyn Notifier>,
        settings: CacheSettings,
    ) -> Self {
        let entries = CacheEntryManager::new(cache.clone(), settings.window);
        Self {
            store,
            cache,
            entries,
            notifier,
            settings,
        }
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// Most recent messages between two participants, oldest first.
    #[instrument(skip(self))]
    pub async fn fetch_conversation(
        &self,
        participant_a: &str,
        participant_b: &str,
    ) -> Result<Vec<Message>> {
        let key = normalize(participant_a, participant_b)?;

        match self.guarded("lookup", self.entries.lookup(&key)).await {
            Ok(CacheLookup::Hit(messages)) => {
                debug!(key = %key, count = messages.len(), "Cache hit");
                return Ok(messages);
            }
            Ok(CacheLookup::Miss) => debug!(key = %key, "Cache miss"),
            Ok(CacheLookup::Corrupted) => {
                warn!(key = %key, "Cache entry was corrupted, rebuilding from store")
            }
            Err(e) => warn!(key = %key, error = %e, "Cache lookup failed, reading from store"),
        }

        let recent = self.load_recent(participant_a, participant_b).await?;

        match self
            .guarded("populate", self.entries.put(&key, recent.clone(), self.settings.ttl))
            .await
        {
            Ok(()) => debug!(key = %key, count = recent.len(), "Cache populated"),
            Err(e) => warn!(key = %key, error = %e, "Failed to populate cache"),
        }

        Ok(recent)
    }

    /// Persist a message, fold it into the cached window and push it to the
    /// receiver.
    #[instrument(skip(self, new_message), fields(sender = %new_message.sender_id, receiver = %new_message.receiver_id))]
    pub async fn send_message(&self, new_message: NewMessage) -> Result<Message> {
        let key = normalize(&new_message.sender_id, &new_message.receiver_id)?;
        new_message.validate()?;

        let message = self.store.create(new_message).await?;
        info!(message_id = %message.id, "Message persisted");

        let append = self.entries.append(&key, message.clone(), self.settings.ttl, |_| {
            self.load_recent(&message.sender_id, &message.receiver_id)
        });
        match self.guarded("append", append).await {
            Ok(window) => debug!(key = %key, count = window.len(), "Cache updated"),
            Err(e) => {
                warn!(key = %key, error = %e, "Cache update failed after persist");
                // A surviving entry would hide this message until it expires
                if let Err(e) = self.guarded("invalidate", self.entries.invalidate(&key)).await {
                    warn!(key = %key, error = %e, "Failed to invalidate stale cache entry");
                }
            }
        }

        if let Err(e) = self.notifier.notify(&message.receiver_id, &message) {
            debug!(message_id = %message.id, error = %e, "Real-time delivery failed");
        }

        Ok(message)
    }

    /// Delete every cached conversation.
    pub async fn flush_cache(&self) -> Result<usize> {
        flush_namespace(self.cache.as_ref(), KEY_NAMESPACE).await
    }

    pub async fn store_healthy(&self) -> bool {
        self.store.is_healthy().await
    }

    pub async fn cache_healthy(&self) -> bool {
        self.cache.is_healthy().await
    }

    async fn load_recent(&self, participant_a: &str, participant_b: &str) -> Result<Vec<Message>> {
        let mut messages = self.store.find_between(participant_a, participant_b).await?;
        let window = self.entries.window();
        if messages.len() > window {
            messages.drain(..messages.len() - window);
        }
        Ok(messages)
    }

    async fn guarded<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.settings.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(ChatError::CacheUnavailable(format!(
                "{} timed out after {:?}",
                op, self.settings.op_timeout
            ))),
        }
    }
}
