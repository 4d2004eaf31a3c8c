//! REST API handlers

use axum::{
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use brivas_chat_cache::{ChatError, Contact, Message, NewMessage};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;

/// Header carrying the authenticated caller, set by the API gateway
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string()),
            ApiError::Chat(err) => {
                let status = StatusCode::from_u16(err.status_code())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let message = if status.is_server_error() {
                    tracing::error!(error = %err, "Request failed");
                    if status == StatusCode::SERVICE_UNAVAILABLE {
                        "Service temporarily unavailable".to_string()
                    } else {
                        "Internal server error".to_string()
                    }
                } else {
                    err.to_string()
                };
                (status, err.error_code(), message)
            }
        };

        (status, Json(json!({ "error": message, "code": code }))).into_response()
    }
}

/// Authenticated caller identity
#[derive(Debug, Clone)]
pub struct CallerId(pub String);

impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| CallerId(value.to_string()))
            .ok_or(ApiError::Unauthorized("missing x-user-id header"))
    }
}

// Health
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub connections: usize,
}

#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    pub ready: bool,
    pub durable_store: bool,
    pub cache: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: crate::SERVICE_ID.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        connections: state.hub.connection_count(),
    })
}

/// The cache is optional for serving, so only the durable store gates
/// readiness.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let durable_store = state.service.store_healthy().await;
    let cache = state.service.cache_healthy().await;

    let status = if durable_store {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(ReadyResponse {
            ready: durable_store,
            durable_store,
            cache,
        }),
    )
}

// Contacts
pub async fn list_users(
    State(state): State<AppState>,
    CallerId(me): CallerId,
) -> Result<Json<Vec<Contact>>, ApiError> {
    let contacts = state.users.list_except(&me).await?;
    Ok(Json(contacts))
}

// Messages

/// Path identifiers get the same trimming as the caller header, so both
/// spellings of a peer address one conversation.
fn peer(Path(peer_id): Path<String>) -> String {
    peer_id.trim().to_string()
}

pub async fn get_messages(
    State(state): State<AppState>,
    CallerId(me): CallerId,
    peer_id: Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let messages = state.service.fetch_conversation(&me, &peer(peer_id)).await?;
    Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: Option<String>,
    #[serde(alias = "image")]
    pub attachment: Option<String>,
}

pub async fn send_message(
    State(state): State<AppState>,
    CallerId(me): CallerId,
    peer_id: Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let message = state
        .service
        .send_message(NewMessage {
            sender_id: me,
            receiver_id: peer(peer_id),
            text: req.text,
            attachment: req.attachment,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

// Operations
#[derive(Debug, Serialize)]
pub struct FlushResponse {
    pub deleted: usize,
}

pub async fn flush_cache(State(state): State<AppState>) -> Result<Json<FlushResponse>, ApiError> {
    let deleted = state.service.flush_cache().await?;
    tracing::info!(deleted, "Conversation cache flushed");
    Ok(Json(FlushResponse { deleted }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::Request;
    use brivas_chat_cache::{
        ConversationService, MemoryCacheStore, MemoryMessageStore, MemoryUserDirectory,
        MessageStore,
    };
    use std::sync::Arc;
    use std::time::Instant;

    use crate::hub::{ConnectionHub, ServerEvent};

    fn state_with(store: Arc<MemoryMessageStore>) -> AppState {
        state_with_users(store, Arc::new(MemoryUserDirectory::new()))
    }

    fn state_with_users(
        store: Arc<MemoryMessageStore>,
        users: Arc<MemoryUserDirectory>,
    ) -> AppState {
        let hub = Arc::new(ConnectionHub::new());
        let service = ConversationService::new(
            store,
            Arc::new(MemoryCacheStore::new()),
            hub.clone(),
        );
        AppState {
            service: Arc::new(service),
            users,
            hub,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn memory_state() -> AppState {
        state_with(Arc::new(MemoryMessageStore::new()))
    }

    #[tokio::test]
    async fn test_list_users_excludes_caller() {
        let users = Arc::new(MemoryUserDirectory::new());
        users.upsert(Contact::new("u1", "Ada", "ada@brivas.io"));
        users.upsert(Contact::new("u2", "Bola", "bola@brivas.io"));
        let state = state_with_users(Arc::new(MemoryMessageStore::new()), users);

        let Json(contacts) = list_users(State(state), CallerId("u1".into()))
            .await
            .unwrap();

        assert_eq!(contacts, vec![Contact::new("u2", "Bola", "bola@brivas.io")]);
    }

    #[tokio::test]
    async fn test_padded_peer_id_shares_conversation() {
        let state = memory_state();

        let (_, Json(sent)) = send_message(
            State(state.clone()),
            CallerId("u1".into()),
            Path(" u2 ".into()),
            send_request("hello"),
        )
        .await
        .unwrap();
        assert_eq!(sent.receiver_id, "u2");

        let Json(messages) = get_messages(State(state), CallerId("u1".into()), Path("u2".into()))
            .await
            .unwrap();
        assert_eq!(messages, vec![sent]);
    }

    fn send_request(text: &str) -> Json<SendMessageRequest> {
        Json(SendMessageRequest {
            text: Some(text.to_string()),
            attachment: None,
        })
    }

    #[tokio::test]
    async fn test_send_then_get() {
        let state = state_with(Arc::new(MemoryMessageStore::new()));

        let (status, Json(sent)) = send_message(
            State(state.clone()),
            CallerId("u1".into()),
            Path("u2".into()),
            send_request("hello"),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(sent.sender_id, "u1");

        let Json(messages) = get_messages(State(state), CallerId("u2".into()), Path("u1".into()))
            .await
            .unwrap();
        assert_eq!(messages, vec![sent]);
    }

    #[tokio::test]
    async fn test_send_pushes_to_online_receiver() {
        let state = state_with(Arc::new(MemoryMessageStore::new()));
        let (_, mut events) = state.hub.register("u2");

        let (_, Json(sent)) = send_message(
            State(state.clone()),
            CallerId("u1".into()),
            Path("u2".into()),
            send_request("are you there?"),
        )
        .await
        .unwrap();

        match events.try_recv().unwrap() {
            ServerEvent::NewMessage { message } => assert_eq!(message, sent),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_empty_message_is_bad_request() {
        let store = Arc::new(MemoryMessageStore::new());
        let state = state_with(store.clone());

        let err = send_message(
            State(state),
            CallerId("u1".into()),
            Path("u2".into()),
            Json(SendMessageRequest {
                text: None,
                attachment: None,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        assert!(store.find_between("u1", "u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_flush_reports_deleted_keys() {
        let state = state_with(Arc::new(MemoryMessageStore::new()));
        for peer in ["u2", "u3"] {
            send_message(
                State(state.clone()),
                CallerId("u1".into()),
                Path(peer.into()),
                send_request("hi"),
            )
            .await
            .unwrap();
        }

        let Json(flushed) = flush_cache(State(state)).await.unwrap();
        assert_eq!(flushed.deleted, 2);
    }

    #[tokio::test]
    async fn test_caller_id_extraction() {
        let (mut parts, _) = Request::builder()
            .header(USER_ID_HEADER, " u1 ")
            .body(())
            .unwrap()
            .into_parts();
        let CallerId(id) = CallerId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(id, "u1");

        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        let err = CallerId::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_store_outage_hides_details() {
        let response =
            ApiError::from(ChatError::DurableStoreUnavailable("db password wrong".into()))
                .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_request_accepts_image_alias() {
        let req: SendMessageRequest =
            serde_json::from_str(r#"{"image": "https://cdn.brivas.io/files/a.png"}"#).unwrap();
        assert!(req.attachment.is_some());
        assert!(req.text.is_none());
    }
}
