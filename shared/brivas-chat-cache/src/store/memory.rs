//! In-memory message store for local development and tests

use async_trait::async_trait;
use parking_lot::RwLock;

use super::MessageStore;
use crate::error::Result;
use crate::message::{Message, NewMessage};

#[derive(Default)]
pub struct MemoryMessageStore {
    messages: RwLock<Vec<Message>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an already-built message, keeping its id and timestamp.
    pub fn insert(&self, message: Message) {
        self.messages.write().push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn find_between(&self, participant_a: &str, participant_b: &str) -> Result<Vec<Message>> {
        let mut found: Vec<Message> = self
            .messages
            .read()
            .iter()
            .filter(|m| m.is_between(participant_a, participant_b))
            .cloned()
            .collect();

        // Stable sort keeps insertion order for equal timestamps
        found.sort_by_key(|m| m.created_at);
        Ok(found)
    }

    async fn create(&self, new_message: NewMessage) -> Result<Message> {
        let message = new_message.into_message();
        self.messages.write().push(message.clone());
        Ok(message)
    }
}
