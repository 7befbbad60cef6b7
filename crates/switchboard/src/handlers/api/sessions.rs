//! Session lifecycle handlers.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::response;
use crate::server::AppState;
use crate::session::{SessionKey, SessionSummary, new_conversation_id};

use super::chat::MISSING_FIELDS;

/// Names a session: either a conversation id or a provider/model pair.
#[derive(Deserialize)]
pub struct SessionRequest {
    provider: Option<String>,
    model: Option<String>,
    conversation_id: Option<String>,
}

impl SessionRequest {
    fn key(self) -> Option<SessionKey> {
        match (self.conversation_id, self.provider, self.model) {
            (Some(id), _, _) => Some(SessionKey::Conversation(id)),
            (None, Some(provider), Some(model)) => Some(SessionKey::model(provider, model)),
            _ => None,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: String,
}

#[derive(Serialize)]
pub struct SessionsResponse {
    sessions: Vec<SessionSummary>,
}

#[derive(Serialize)]
pub struct ConversationResponse {
    conversation_id: String,
}

fn session_key(body: Result<Json<SessionRequest>, JsonRejection>) -> Result<SessionKey, Response> {
    body.ok()
        .and_then(|Json(req)| req.key())
        .ok_or_else(|| response::bad_request(MISSING_FIELDS).into_response())
}

/// POST /api/clear_chat
pub async fn clear_chat(
    State(state): State<AppState>,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Response {
    let key = match session_key(body) {
        Ok(key) => key,
        Err(resp) => return resp,
    };

    match state.chat.clear_chat(&key).await {
        Ok(()) => Json(MessageResponse {
            message: "Chat history cleared".to_string(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /api/end_chat
pub async fn end_chat(
    State(state): State<AppState>,
    body: Result<Json<SessionRequest>, JsonRejection>,
) -> Response {
    let key = match session_key(body) {
        Ok(key) => key,
        Err(resp) => return resp,
    };

    match state.chat.end_chat(&key) {
        Ok(()) => Json(MessageResponse {
            message: "Chat session ended".to_string(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        sessions: state.chat.list_sessions(),
    })
}

/// POST /api/conversations
///
/// Mints a conversation id. The session itself is created by its first chat.
pub async fn create_conversation() -> Response {
    let conversation_id = new_conversation_id();
    (
        StatusCode::CREATED,
        Json(ConversationResponse { conversation_id }),
    )
        .into_response()
}
