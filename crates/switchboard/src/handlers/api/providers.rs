//! Provider and model listing.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::response;
use crate::server::AppState;

#[derive(Serialize)]
pub struct ProvidersResponse {
    providers: Vec<String>,
}

#[derive(Serialize)]
pub struct ModelsResponse {
    models: Vec<String>,
}

/// GET /api/providers
pub async fn list_providers(State(state): State<AppState>) -> Json<ProvidersResponse> {
    let providers = state
        .chat
        .catalog()
        .list_providers()
        .into_iter()
        .map(str::to_string)
        .collect();
    Json(ProvidersResponse { providers })
}

/// GET /api/models/{provider}
pub async fn list_models(State(state): State<AppState>, Path(provider): Path<String>) -> Response {
    match state.chat.catalog().list_models(&provider) {
        Ok(models) => Json(ModelsResponse {
            models: models.to_vec(),
        })
        .into_response(),
        Err(e) => response::not_found(e.to_string()).into_response(),
    }
}
