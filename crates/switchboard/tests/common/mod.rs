//! Common test utilities.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;

use switchboard::access::AccessGate;
use switchboard::catalog::{Budgets, ProviderCatalog};
use switchboard::config::AccessConfig;
use switchboard::llm::{ClientFactory, LLMError, Message, UpstreamClient};
use switchboard::orchestrator::ChatOrchestrator;
use switchboard::server::{self, AppState};
use switchboard::session::SessionRegistry;

/// Replies with the model name, the history length it was given and the message.
pub struct EchoClient {
    model: String,
}

#[async_trait]
impl UpstreamClient for EchoClient {
    async fn send(&self, message: &str, history: &[Message]) -> Result<String, LLMError> {
        Ok(format!("{} [{}]: {message}", self.model, history.len()))
    }
}

pub fn echo_factory() -> ClientFactory {
    Arc::new(|model: &str| -> Result<Box<dyn UpstreamClient>, LLMError> {
        Ok(Box::new(EchoClient {
            model: model.to_string(),
        }))
    })
}

/// Catalog with provider "demo" serving "m1" and "m2", plus a provider whose key is missing.
pub fn test_catalog() -> ProviderCatalog {
    let budgets = Budgets {
        chunk_tokens: 8,
        memory_tokens: 1024,
    };
    ProviderCatalog::new()
        .with_provider(
            "demo",
            vec!["m1".to_string(), "m2".to_string()],
            budgets,
            echo_factory(),
        )
        .with_provider(
            "locked",
            vec!["m1".to_string()],
            budgets,
            Arc::new(|_: &str| -> Result<Box<dyn UpstreamClient>, LLMError> {
                Err(LLMError::missing_api_key("locked", "LOCKED_API_KEY"))
            }),
        )
}

/// Create a test `AppState` with the given access rules.
pub fn test_app_state(access: AccessConfig) -> AppState {
    AppState {
        chat: ChatOrchestrator::new(Arc::new(test_catalog()), SessionRegistry::new(), None),
        access: AccessGate::from_config(&access).unwrap(),
    }
}

/// Create a test app that admits loopback callers without a token.
pub fn test_app() -> (Router, AppState) {
    test_app_with_access(AccessConfig::default())
}

pub fn test_app_with_access(access: AccessConfig) -> (Router, AppState) {
    let state = test_app_state(access);
    let app = server::build_app(state.clone(), 300, 1024 * 1024);
    (app, state)
}

/// Attach the peer address the server would record for a real connection.
pub fn from_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub fn get(uri: &str) -> Request<Body> {
    from_peer(Request::get(uri).body(Body::empty()).unwrap(), "127.0.0.1:40000")
}

pub fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    from_peer(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        "127.0.0.1:40000",
    )
}
