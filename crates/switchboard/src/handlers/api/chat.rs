//! Chat exchange handler.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::Role;
use crate::response;
use crate::server::AppState;
use crate::session::{ModelRef, SessionKey};

pub(super) const MISSING_FIELDS: &str = "Missing required fields";

#[derive(Deserialize)]
pub struct ChatRequest {
    provider: Option<String>,
    model: Option<String>,
    message: Option<String>,
    /// Continue an independent conversation instead of the shared per-model one.
    conversation_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    role: Role,
    content: String,
}

/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            debug!(error = %rejection, "Rejected chat body");
            return response::bad_request(MISSING_FIELDS).into_response();
        }
    };
    let (Some(provider), Some(model), Some(message)) = (req.provider, req.model, req.message)
    else {
        return response::bad_request(MISSING_FIELDS).into_response();
    };

    let binding = ModelRef::new(provider, model);
    let key = match req.conversation_id {
        Some(id) => SessionKey::Conversation(id),
        None => SessionKey::Model(binding.clone()),
    };

    match state.chat.chat(&key, &binding, &message).await {
        Ok(content) => Json(ChatResponse {
            role: Role::Assistant,
            content,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}
