use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::timeout::TimeoutLayer;

use crate::access::{self, AccessGate};
use crate::handlers;
use crate::orchestrator::ChatOrchestrator;

// ============================================================================
// Application State
// ============================================================================

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub chat: ChatOrchestrator,
    pub access: AccessGate,
}

// ============================================================================
// Server Setup
// ============================================================================

pub fn build_app(state: AppState, request_timeout_seconds: u64, max_body_bytes: usize) -> Router {
    let gate = state.access.clone();

    let api_routes = Router::new()
        .route("/providers", get(handlers::api::list_providers))
        .route("/models/{provider}", get(handlers::api::list_models))
        .route("/chat", post(handlers::api::chat))
        .route("/clear_chat", post(handlers::api::clear_chat))
        .route("/end_chat", post(handlers::api::end_chat))
        .route("/sessions", get(handlers::api::list_sessions))
        .route("/conversations", post(handlers::api::create_conversation))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(request_timeout_seconds),
        ));

    Router::new()
        .route("/livez", get(handlers::livez))
        .route("/readyz", get(handlers::readyz))
        .route("/version", get(handlers::version))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            gate,
            access::require_access,
        ))
}
