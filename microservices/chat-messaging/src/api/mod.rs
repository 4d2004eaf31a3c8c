//! API module - REST and WebSocket

pub mod rest;
pub mod websocket;

use axum::{
    routing::{delete, get},
    Router,
};

use crate::AppState;

/// Public request router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(rest::health))
        .route("/ready", get(rest::ready))

        // Contacts
        .route("/api/v1/users", get(rest::list_users))

        // Conversation endpoints
        .route(
            "/api/v1/messages/{peer_id}",
            get(rest::get_messages).post(rest::send_message),
        )

        // WebSocket
        .route("/api/v1/ws", get(websocket::ws_handler))
        .with_state(state)
}

/// Operations router, served on the admin listener only
pub fn create_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(rest::health))
        .route("/api/v1/admin/cache", delete(rest::flush_cache))
        .with_state(state)
}
