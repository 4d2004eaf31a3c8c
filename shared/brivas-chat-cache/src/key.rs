//! Conversation key normalization

use std::fmt;

use crate::error::{ChatError, Result};

/// Namespace shared by every conversation entry in the cache substrate.
pub const KEY_NAMESPACE: &str = "chat:messages:";

const SEPARATOR: char = ':';

/// Canonical cache key for an unordered pair of participants.
///
/// `ConversationKey::between(a, b) == ConversationKey::between(b, a)` for all
/// valid identifiers. Identifiers are ordered lexicographically by their
/// string bytes, so `"9"` sorts after `"10"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(String);

impl ConversationKey {
    pub fn between(participant_a: &str, participant_b: &str) -> Result<Self> {
        validate_identifier(participant_a)?;
        validate_identifier(participant_b)?;

        let (low, high) = if participant_a <= participant_b {
            (participant_a, participant_b)
        } else {
            (participant_b, participant_a)
        };

        Ok(Self(format!("{KEY_NAMESPACE}{low}{SEPARATOR}{high}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the conversation key for two participants.
pub fn normalize(participant_a: &str, participant_b: &str) -> Result<ConversationKey> {
    ConversationKey::between(participant_a, participant_b)
}

// A separator inside an identifier would let ("a:b", "c") and ("a", "b:c")
// share a key.
fn validate_identifier(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(ChatError::InvalidIdentifier(
            "participant identifier is empty".to_string(),
        ));
    }
    if id.contains(SEPARATOR) {
        return Err(ChatError::InvalidIdentifier(format!(
            "participant identifier {id:?} contains '{SEPARATOR}'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_order_independent() {
        let pairs = [
            ("u1", "u2"),
            ("alice", "bob"),
            ("65f1c2", "65a9e0"),
            ("10", "9"),
            ("same", "same"),
        ];

        for (a, b) in pairs {
            assert_eq!(normalize(a, b).unwrap(), normalize(b, a).unwrap());
        }
    }

    #[test]
    fn test_key_format() {
        let key = normalize("u2", "u1").unwrap();
        assert_eq!(key.as_str(), "chat:messages:u1:u2");
        assert!(key.as_str().starts_with(KEY_NAMESPACE));
    }

    #[test]
    fn test_lexicographic_ordering_of_numeric_ids() {
        let key = normalize("9", "10").unwrap();
        assert_eq!(key.to_string(), "chat:messages:10:9");
    }

    #[test]
    fn test_rejects_empty_identifier() {
        assert!(matches!(
            normalize("", "u2"),
            Err(ChatError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            normalize("u1", "   "),
            Err(ChatError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_rejects_separator_in_identifier() {
        assert!(normalize("a:b", "c").is_err());
        assert!(normalize("a", "b:c").is_err());
    }
}
