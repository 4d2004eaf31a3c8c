//! Durable message store adapter

mod lumadb;
mod memory;

pub use lumadb::LumaDbMessageStore;
pub use memory::MemoryMessageStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::message::{Message, NewMessage};

/// Authoritative, append-only message persistence.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Every message between the two participants, in either direction,
    /// oldest first. No limit is applied.
    async fn find_between(&self, participant_a: &str, participant_b: &str) -> Result<Vec<Message>>;

    /// Persist a new message, assigning its identifier and creation time.
    async fn create(&self, new_message: NewMessage) -> Result<Message>;

    async fn is_healthy(&self) -> bool {
        true
    }
}
