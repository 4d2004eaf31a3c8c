//! Message types for direct conversations

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ChatError, Result};

/// Maximum text body length accepted on send
pub const MAX_TEXT_LENGTH: usize = 10_000;

/// Message entity, immutable once created by the durable store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Reference to an already-uploaded attachment (e.g. an image URL)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Whether this message was exchanged between the two participants, in
    /// either direction.
    pub fn is_between(&self, participant_a: &str, participant_b: &str) -> bool {
        (self.sender_id == participant_a && self.receiver_id == participant_b)
            || (self.sender_id == participant_b && self.receiver_id == participant_a)
    }
}

/// Send request, turned into a [`Message`] by the durable store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub sender_id: String,
    pub receiver_id: String,
    pub text: Option<String>,
    pub attachment: Option<String>,
}

impl NewMessage {
    pub fn text(
        sender_id: impl Into<String>,
        receiver_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            sender_id: sender_id.into(),
            receiver_id: receiver_id.into(),
            text: Some(text.into()),
            attachment: None,
        }
    }

    pub fn with_attachment(mut self, attachment: impl Into<String>) -> Self {
        self.attachment = Some(attachment.into());
        self
    }

    /// Validate content before anything is persisted.
    pub fn validate(&self) -> Result<()> {
        let has_text = self.text.as_deref().is_some_and(|t| !t.trim().is_empty());
        let has_attachment = self
            .attachment
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty());

        if !has_text && !has_attachment {
            return Err(ChatError::Validation(
                "message needs text or an attachment".to_string(),
            ));
        }
        if let Some(text) = &self.text {
            if text.chars().count() > MAX_TEXT_LENGTH {
                return Err(ChatError::Validation(format!(
                    "message text too long (max {MAX_TEXT_LENGTH} chars)"
                )));
            }
        }
        Ok(())
    }

    /// Assign identifier and creation timestamp.
    ///
    /// The timestamp is truncated to microseconds, the resolution of
    /// `TIMESTAMPTZ`, so a cached copy equals the row read back later.
    pub fn into_message(self) -> Message {
        Message {
            id: Uuid::new_v4(),
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            text: self.text,
            attachment: self.attachment,
            created_at: Utc::now().trunc_subsecs(6),
        }
    }
}
