//! Cache window, expiry and timeout settings

use std::time::Duration;

/// Number of most recent messages kept per conversation
pub const WINDOW_SIZE: usize = 20;

/// Expiry of a conversation entry, measured from its last write
pub const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Upper bound on a single cache call before it is treated as unavailable
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub window: usize,
    pub ttl: Duration,
    pub op_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            window: WINDOW_SIZE,
            ttl: CACHE_TTL,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }
}

impl CacheSettings {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }
}
