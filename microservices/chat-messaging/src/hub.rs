//! Connection hub - routes new messages to live WebSocket sessions

use brivas_chat_cache::{Message, Notifier, NotifyError};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Server-to-client events
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Connected { connection_id: Uuid },
    NewMessage { message: Message },
}

struct Connection {
    id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

/// Live sessions per user; a user may be connected from several devices.
#[derive(Default)]
pub struct ConnectionHub {
    connections: DashMap<String, Vec<Connection>>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: &str) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.connections
            .entry(user_id.to_string())
            .or_default()
            .push(Connection { id, tx });
        (id, rx)
    }

    pub fn unregister(&self, user_id: &str, connection_id: Uuid) {
        if let Some(mut sessions) = self.connections.get_mut(user_id) {
            sessions.retain(|c| c.id != connection_id);
        }
        self.connections.remove_if(user_id, |_, sessions| sessions.is_empty());
    }

    pub fn is_online(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.iter().map(|entry| entry.value().len()).sum()
    }
}

impl Notifier for ConnectionHub {
    fn notify(&self, receiver_id: &str, message: &Message) -> Result<(), NotifyError> {
        let Some(mut sessions) = self.connections.get_mut(receiver_id) else {
            return Ok(());
        };

        sessions.retain(|c| {
            c.tx
                .send(ServerEvent::NewMessage {
                    message: message.clone(),
                })
                .is_ok()
        });
        let closed = sessions.is_empty();
        drop(sessions);

        if closed {
            self.connections
                .remove_if(receiver_id, |_, sessions| sessions.is_empty());
            return Err(NotifyError::ChannelClosed(receiver_id.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brivas_chat_cache::NewMessage;

    #[test]
    fn test_offline_receiver_is_noop() {
        let hub = ConnectionHub::new();
        let message = NewMessage::text("u1", "u2", "hi").into_message();

        assert!(hub.notify("u2", &message).is_ok());
    }

    #[test]
    fn test_delivers_to_every_session() {
        let hub = ConnectionHub::new();
        let (_, mut phone) = hub.register("u2");
        let (_, mut laptop) = hub.register("u2");
        let message = NewMessage::text("u1", "u2", "hi").into_message();

        hub.notify("u2", &message).unwrap();

        for rx in [&mut phone, &mut laptop] {
            match rx.try_recv().unwrap() {
                ServerEvent::NewMessage { message: received } => assert_eq!(received, message),
                other => panic!("unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn test_unregister_last_session_goes_offline() {
        let hub = ConnectionHub::new();
        let (first, _rx1) = hub.register("u2");
        let (second, _rx2) = hub.register("u2");
        assert_eq!(hub.connection_count(), 2);

        hub.unregister("u2", first);
        assert!(hub.is_online("u2"));
        hub.unregister("u2", second);
        assert!(!hub.is_online("u2"));
    }

    #[test]
    fn test_closed_sessions_are_pruned() {
        let hub = ConnectionHub::new();
        let (_, rx) = hub.register("u2");
        drop(rx);
        let message = NewMessage::text("u1", "u2", "hi").into_message();

        assert!(matches!(
            hub.notify("u2", &message),
            Err(NotifyError::ChannelClosed(_))
        ));
        assert!(!hub.is_online("u2"));
    }

    #[test]
    fn test_event_wire_format() {
        let event = ServerEvent::NewMessage {
            message: NewMessage::text("u1", "u2", "hi").into_message(),
        };
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "new_message");
        assert_eq!(json["message"]["text"], "hi");
    }
}
