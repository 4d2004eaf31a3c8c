//! User directory - contacts a caller can start a conversation with

mod lumadb;
mod memory;

pub use lumadb::LumaDbUserDirectory;
pub use memory::MemoryUserDirectory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Public profile of a registered user; credentials never leave the
/// account service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_pic: Option<String>,
}

impl Contact {
    pub fn new(
        id: impl Into<String>,
        full_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            full_name: full_name.into(),
            email: email.into(),
            profile_pic: None,
        }
    }

    pub fn with_profile_pic(mut self, url: impl Into<String>) -> Self {
        self.profile_pic = Some(url.into());
        self
    }
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Every registered user except `user_id`, ordered by name.
    async fn list_except(&self, user_id: &str) -> Result<Vec<Contact>>;

    async fn is_healthy(&self) -> bool {
        true
    }
}
