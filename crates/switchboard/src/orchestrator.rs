//! Chat orchestration: one request-scoped exchange against a session.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;
use tokio::sync::MutexGuard;
use tracing::{debug, warn};

use crate::catalog::{CatalogError, ProviderCatalog};
use crate::llm::{LLMError, Message};
use crate::session::{
    ConversationMemory, ModelRef, SessionError, SessionKey, SessionRegistry, SessionSpec,
    SessionSummary, chunker,
};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Message must not be empty")]
    EmptyMessage,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] LLMError),

    #[error("upstream did not answer within {0:?}")]
    Timeout(Duration),
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ChatError::EmptyMessage => StatusCode::BAD_REQUEST,
            ChatError::Catalog(_) => StatusCode::NOT_FOUND,
            ChatError::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
            ChatError::Session(_) | ChatError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ChatError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Drives chat exchanges: session lookup, chunking, memory and the upstream call.
#[derive(Clone)]
pub struct ChatOrchestrator {
    catalog: Arc<ProviderCatalog>,
    sessions: SessionRegistry,
    upstream_timeout: Option<Duration>,
}

impl ChatOrchestrator {
    pub fn new(
        catalog: Arc<ProviderCatalog>,
        sessions: SessionRegistry,
        upstream_timeout: Option<Duration>,
    ) -> Self {
        Self {
            catalog,
            sessions,
            upstream_timeout,
        }
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Send `message` on the session for `key`, creating it bound to `binding` if needed.
    pub async fn chat(
        &self,
        key: &SessionKey,
        binding: &ModelRef,
        message: &str,
    ) -> Result<String, ChatError> {
        self.chat_with_timeout(key, binding, message, self.upstream_timeout)
            .await
    }

    /// Like [`chat`](Self::chat) with an explicit bound on the upstream call.
    ///
    /// Oversized messages are split; every chunk but the last is recorded as
    /// a user turn, and the last is sent with the history. Exchanges on one
    /// session run one at a time, in arrival order. On failure the already
    /// recorded chunks stay in memory; the final chunk and reply do not.
    pub async fn chat_with_timeout(
        &self,
        key: &SessionKey,
        binding: &ModelRef,
        message: &str,
        timeout: Option<Duration>,
    ) -> Result<String, ChatError> {
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        // An existing session answers with its bound model; only a new one
        // needs the requested model to be in the catalog.
        let session = match self.sessions.get(key) {
            Some(session) => session,
            None => {
                let entry = self.catalog.resolve(binding)?;
                let factory = entry.factory.clone();
                let spec = SessionSpec {
                    binding: binding.clone(),
                    memory_tokens: entry.budgets.memory_tokens,
                };
                self.sessions
                    .get_or_create(key, spec, |bound| factory(bound.model.as_str()))
                    .await?
            }
        };

        if session.binding() != binding {
            debug!(
                session = %key,
                bound = %session.binding(),
                requested = %binding,
                "Session already bound; keeping existing model"
            );
        }

        let mut memory = InFlight::begin(session.lock().await);

        let chunk_tokens = self.catalog.budgets(&session.binding().provider)?.chunk_tokens;
        let chunks = chunker::split(message, chunk_tokens);
        let Some((last, head)) = chunks.split_last() else {
            return Err(ChatError::EmptyMessage);
        };
        for chunk in head {
            memory.append(Message::user(*chunk));
        }

        let history = memory.history();
        debug!(
            session = %key,
            chunks = chunks.len(),
            history = history.len(),
            "Sending chat exchange"
        );

        let send = session.client().send(last, &history);
        let result = match timeout {
            Some(limit) => match tokio::time::timeout(limit, send).await {
                Ok(result) => result.map_err(ChatError::from),
                Err(_) => Err(ChatError::Timeout(limit)),
            },
            None => send.await.map_err(ChatError::from),
        };

        match result {
            Ok(reply) => {
                memory.append(Message::user(*last));
                memory.append(Message::assistant(reply.clone()));
                Ok(reply)
            }
            Err(e) => {
                warn!(session = %key, error = %e, "Chat exchange failed");
                Err(e)
            }
        }
    }

    /// Forget a session's history, keeping its client.
    pub async fn clear_chat(&self, key: &SessionKey) -> Result<(), ChatError> {
        Ok(self.sessions.reset_session(key).await?)
    }

    /// Drop a session entirely.
    pub fn end_chat(&self, key: &SessionKey) -> Result<(), ChatError> {
        self.sessions.evict(key)?;
        Ok(())
    }

    pub fn list_sessions(&self) -> Vec<SessionSummary> {
        self.sessions.list()
    }
}

/// Memory held for one exchange; releases the pin however the exchange ends.
struct InFlight<'a>(MutexGuard<'a, ConversationMemory>);

impl<'a> InFlight<'a> {
    fn begin(mut memory: MutexGuard<'a, ConversationMemory>) -> Self {
        memory.begin_pinned();
        Self(memory)
    }
}

impl Deref for InFlight<'_> {
    type Target = ConversationMemory;

    fn deref(&self) -> &ConversationMemory {
        &self.0
    }
}

impl DerefMut for InFlight<'_> {
    fn deref_mut(&mut self) -> &mut ConversationMemory {
        &mut self.0
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.release_pinned();
    }
}
