//! LLM provider trait and API flavors.

use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

use super::error::LLMError;
use super::types::{ChatRequest, ChatResponse};

// ============================================================================
// ApiKind Enum
// ============================================================================

/// Wire protocol spoken by an upstream provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum ApiKind {
    /// OpenAI chat completions (OpenAI, Groq, Gemini, DeepSeek, SambaNova, Ollama, ...)
    OpenAI,
    /// Anthropic messages API
    Anthropic,
}

impl ApiKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiKind::OpenAI => "openai",
            ApiKind::Anthropic => "anthropic",
        }
    }

    /// API flavor implied by a provider name when the catalog doesn't say.
    #[must_use]
    pub fn for_provider(provider: &str) -> Self {
        match provider {
            "anthropic" => ApiKind::Anthropic,
            _ => ApiKind::OpenAI,
        }
    }
}

impl std::fmt::Display for ApiKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ApiKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openai" | "openai-compatible" => Ok(ApiKind::OpenAI),
            "anthropic" => Ok(ApiKind::Anthropic),
            other => Err(format!(
                "unknown api '{other}' (expected 'openai' or 'anthropic')"
            )),
        }
    }
}

impl TryFrom<String> for ApiKind {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ============================================================================
// LLMProvider Trait
// ============================================================================

/// Trait for LLM providers with different API formats.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Make a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError>;
}
