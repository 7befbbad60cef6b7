//! Session error types.

use std::sync::Arc;

use thiserror::Error;

use crate::llm::LLMError;

use super::key::SessionKey;

/// Errors from the session registry.
///
/// Cloneable so every caller waiting on one construction sees the same outcome.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    #[error("no active session for {0}")]
    NotFound(SessionKey),

    #[error("failed to create client: {0}")]
    Construction(Arc<LLMError>),

    #[error("session construction for {0} was abandoned")]
    Abandoned(SessionKey),
}
