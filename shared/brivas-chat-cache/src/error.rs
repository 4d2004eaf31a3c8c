//! Error types for the chat cache

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChatError>;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Durable store unavailable: {0}")]
    DurableStoreUnavailable(String),

    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("Cache entry corrupted at {key}: {reason}")]
    CacheCorrupted { key: String, reason: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChatError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidIdentifier(_) | Self::Validation(_) => 400,
            Self::DurableStoreUnavailable(_) | Self::CacheUnavailable(_) => 503,
            _ => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DurableStoreUnavailable(_) => "DURABLE_STORE_UNAVAILABLE",
            Self::CacheUnavailable(_) => "CACHE_UNAVAILABLE",
            Self::CacheCorrupted { .. } => "CACHE_CORRUPTED",
            Self::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the error belongs to the cache layer and must be absorbed
    /// instead of surfacing to the caller.
    pub fn is_cache_fault(&self) -> bool {
        matches!(self, Self::CacheUnavailable(_) | Self::CacheCorrupted { .. })
    }
}
