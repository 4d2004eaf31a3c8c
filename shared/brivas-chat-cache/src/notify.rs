//! Real-time delivery notification

use thiserror::Error;

use crate::message::Message;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery channel closed for {0}")]
    ChannelClosed(String),

    #[error("Delivery rejected: {0}")]
    Rejected(String),
}

/// Fire-and-forget push of a freshly sent message to its receiver.
///
/// Implementations must not block. An offline or unknown receiver is not an
/// error. Callers discard failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, receiver_id: &str, message: &Message) -> Result<(), NotifyError>;
}

/// Notifier for deployments without a real-time path.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _receiver_id: &str, _message: &Message) -> Result<(), NotifyError> {
        Ok(())
    }
}
