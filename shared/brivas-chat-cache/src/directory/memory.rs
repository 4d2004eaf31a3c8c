//! In-memory user directory for local development and tests

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Contact, UserDirectory};
use crate::error::Result;

#[derive(Default)]
pub struct MemoryUserDirectory {
    contacts: RwLock<Vec<Contact>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a contact, replacing any existing one with the same id.
    pub fn upsert(&self, contact: Contact) {
        let mut contacts = self.contacts.write();
        contacts.retain(|c| c.id != contact.id);
        contacts.push(contact);
    }

    pub fn len(&self) -> usize {
        self.contacts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.read().is_empty()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn list_except(&self, user_id: &str) -> Result<Vec<Contact>> {
        let mut found: Vec<Contact> = self
            .contacts
            .read()
            .iter()
            .filter(|c| c.id != user_id)
            .cloned()
            .collect();

        found.sort_by(|a, b| a.full_name.cmp(&b.full_name).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }
}
