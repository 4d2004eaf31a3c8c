//! BRIVAS Chat Cache
//!
//! Read-through / write-through cache of the most recent messages exchanged
//! between two participants.
//!
//! - Conversation keys normalized over the unordered participant pair
//! - Bounded window (last 20 messages) with a 24h expiry per conversation
//! - Self-healing on corrupted cache payloads
//! - Durable store fallback and repopulation on miss
//! - User directory for listing conversation partners

pub mod cache;
pub mod directory;
pub mod entry;
pub mod error;
pub mod key;
pub mod lumadb;
pub mod message;
pub mod notify;
pub mod service;
pub mod settings;
pub mod store;


pub use cache::{flush_namespace, CacheStore, LumaDbCacheStore, MemoryCacheStore};
pub use directory::{Contact, LumaDbUserDirectory, MemoryUserDirectory, UserDirectory};
pub use entry::{CacheEntryManager, CacheLookup};
pub use error::{ChatError, Result};
pub use key::{normalize, ConversationKey, KEY_NAMESPACE};
pub use lumadb::{LumaDbPool, PoolConfig};
pub use message::{Message, NewMessage, MAX_TEXT_LENGTH};
pub use notify::{NoopNotifier, Notifier, NotifyError};
pub use service::ConversationService;
pub use settings::{CacheSettings, CACHE_TTL, DEFAULT_OP_TIMEOUT, WINDOW_SIZE};
pub use store::{LumaDbMessageStore, MemoryMessageStore, MessageStore};
