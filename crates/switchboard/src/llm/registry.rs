//! Provider registry: turns catalog settings into client factories.

use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, info, warn};

use super::anthropic::AnthropicProvider;
use super::client::{ChatClient, ClientFactory, UpstreamClient};
use super::error::LLMError;
use super::openai::OpenAICompatibleProvider;
use super::provider::{ApiKind, LLMProvider};

/// Default base URLs for providers the catalog may name without one.
pub mod defaults {
    pub const ALIBABA: &str = "https://dashscope-intl.aliyuncs.com/compatible-mode/v1";
    pub const ANTHROPIC: &str = "https://api.anthropic.com";
    pub const DEEPSEEK: &str = "https://api.deepseek.com";
    pub const GEMINI: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
    pub const GROQ: &str = "https://api.groq.com/openai/v1";
    pub const OLLAMA: &str = "http://localhost:11434/v1";
    pub const OPENAI: &str = "https://api.openai.com/v1";
    pub const SAMBANOVA: &str = "https://api.sambanova.ai/v1";

    /// Reply budget sent upstream when the catalog doesn't set one.
    pub const MAX_TOKENS: u32 = 4096;

    pub fn base_url(provider: &str) -> Option<&'static str> {
        Some(match provider {
            "alibaba" => ALIBABA,
            "anthropic" => ANTHROPIC,
            "deepseek" => DEEPSEEK,
            "gemini" => GEMINI,
            "groq" => GROQ,
            "ollama" => OLLAMA,
            "openai" => OPENAI,
            "sambanova" => SAMBANOVA,
            _ => return None,
        })
    }

    /// Providers that need a signed SDK transport rather than a bearer key.
    pub fn unsupported(provider: &str) -> Option<&'static str> {
        match provider {
            "aws" | "bedrock" => Some("AWS Bedrock requires SigV4-signed requests"),
            _ => None,
        }
    }

    /// Environment variable holding a provider's API key, `None` for keyless providers.
    pub fn api_key_env(provider: &str) -> Option<String> {
        match provider {
            "ollama" => None,
            "alibaba" => Some("QWEN_API_KEY".to_string()),
            other => Some(format!(
                "{}_API_KEY",
                other.to_ascii_uppercase().replace('-', "_")
            )),
        }
    }
}

/// Connection settings for one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api: ApiKind,
    pub base_url: String,
    pub api_key_env: Option<String>,
    pub max_tokens: u32,
}

/// Creates provider clients on demand.
///
/// Holds a shared `reqwest::Client` that every provider built here reuses,
/// enabling connection pooling across sessions.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    client: Client,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the factory for `provider`.
    ///
    /// The API key is read from the environment once, here. A missing key is not
    /// an error until a client is actually constructed, so providers without
    /// credentials can still be listed.
    pub fn factory(&self, provider: &str, settings: &ProviderSettings) -> ClientFactory {
        let api_key = match &settings.api_key_env {
            Some(env) => match std::env::var(env) {
                Ok(key) if !key.is_empty() => {
                    info!(provider, env = %env, "Found API key");
                    Some(key)
                }
                _ => {
                    warn!(provider, env = %env, "No API key found; chats will fail until it is set");
                    None
                }
            },
            None => {
                debug!(provider, "Provider needs no API key");
                None
            }
        };

        let client = self.client.clone();
        let provider = provider.to_string();
        let settings = settings.clone();

        Arc::new(move |model: &str| {
            if api_key.is_none()
                && let Some(env) = &settings.api_key_env
            {
                return Err(LLMError::missing_api_key(&provider, env));
            }

            let upstream: Arc<dyn LLMProvider> = match settings.api {
                ApiKind::OpenAI => Arc::new(OpenAICompatibleProvider::new(
                    client.clone(),
                    settings.base_url.clone(),
                    api_key.clone(),
                )),
                ApiKind::Anthropic => Arc::new(AnthropicProvider::new(
                    client.clone(),
                    api_key.clone().unwrap_or_default(),
                    settings.base_url.clone(),
                )),
            };

            debug!(provider = %provider, model, api = %settings.api, "Constructed upstream client");
            let chat = ChatClient::new(upstream, model).with_max_tokens(settings.max_tokens);
            Ok(Box::new(chat) as Box<dyn UpstreamClient>)
        })
    }
}
