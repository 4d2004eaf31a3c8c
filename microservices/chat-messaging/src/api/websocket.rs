//! WebSocket handler for real-time delivery

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use tracing::{debug, info, warn};

use crate::api::rest::CallerId;
use crate::hub::{ConnectionHub, ServerEvent};
use crate::AppState;

/// WebSocket upgrade handler
///
/// The session belongs to the gateway-authenticated caller; query
/// parameters are not trusted for identity. `CallerId` is extracted before
/// the upgrade so a missing header is rejected with 401.
pub async fn ws_handler(
    CallerId(user_id): CallerId,
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub, user_id))
}

/// Push hub events to the socket until either side goes away
async fn handle_socket(socket: WebSocket, hub: Arc<ConnectionHub>, user_id: String) {
    let (connection_id, mut events) = hub.register(&user_id);
    info!(user_id = %user_id, %connection_id, "WebSocket connected");

    let (mut sender, mut receiver) = socket.split();

    if send_event(&mut sender, &ServerEvent::Connected { connection_id }).await {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        if !send_event(&mut sender, &event).await {
                            break;
                        }
                    }
                    None => break,
                },
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Clients only listen; pings are answered by the protocol layer
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    hub.unregister(&user_id, connection_id);
    info!(user_id = %user_id, %connection_id, "WebSocket disconnected");
}

/// Returns false once the socket can no longer be written to.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> bool {
    let json = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "Failed to encode WebSocket event");
            return true;
        }
    };

    match sender.send(Message::Text(json.into())).await {
        Ok(()) => true,
        Err(e) => {
            debug!(error = %e, "WebSocket send failed");
            false
        }
    }
}
