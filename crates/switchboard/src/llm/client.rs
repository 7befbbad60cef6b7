//! The upstream client seam the session core depends on.

use std::sync::Arc;

use async_trait::async_trait;

use super::error::LLMError;
use super::provider::LLMProvider;
use super::types::{ChatRequest, Message};

/// A provider-bound client that answers one message given prior history.
///
/// Implementations only need to tolerate sequential use; the session registry
/// never issues overlapping calls against the same client.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Send `message` as the newest user turn after `history` and return the reply text.
    async fn send(&self, message: &str, history: &[Message]) -> Result<String, LLMError>;
}

/// Builds the client for one model of a provider.
pub type ClientFactory =
    Arc<dyn Fn(&str) -> Result<Box<dyn UpstreamClient>, LLMError> + Send + Sync>;

/// [`UpstreamClient`] over a chat completion provider, pinned to one model.
pub struct ChatClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: Option<u32>,
}

impl ChatClient {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens: None,
        }
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl UpstreamClient for ChatClient {
    async fn send(&self, message: &str, history: &[Message]) -> Result<String, LLMError> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.extend_from_slice(history);
        messages.push(Message::user(message));

        let request = ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: self.max_tokens,
        };

        self.provider
            .chat(request)
            .await?
            .into_content()
            .ok_or(LLMError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::llm::types::{ChatResponse, Choice, Role};

    /// Records the last request and replies with a fixed answer.
    #[derive(Default)]
    struct RecordingProvider {
        seen: Mutex<Option<(String, Vec<Message>, Option<u32>)>>,
        empty: bool,
    }

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
            *self.seen.lock().unwrap() =
                Some((request.model, request.messages, request.max_tokens));
            let choices = if self.empty {
                Vec::new()
            } else {
                vec![Choice {
                    index: 0,
                    message: Message::assistant("pong"),
                    finish_reason: Some("stop".to_string()),
                }]
            };
            Ok(ChatResponse {
                id: "resp_1".to_string(),
                choices,
                usage: None,
            })
        }
    }

    #[tokio::test]
    async fn send_appends_message_after_history() {
        let provider = Arc::new(RecordingProvider::default());
        let client = ChatClient::new(provider.clone(), "m1").with_max_tokens(512);

        let history = vec![Message::user("earlier"), Message::assistant("noted")];
        let reply = client.send("ping", &history).await.unwrap();
        assert_eq!(reply, "pong");

        let (model, messages, max_tokens) = provider.seen.lock().unwrap().take().unwrap();
        assert_eq!(model, "m1");
        assert_eq!(max_tokens, Some(512));
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].role, Role::User);
        assert_eq!(messages[2].content, "ping");
    }

    #[tokio::test]
    async fn send_without_choices_is_an_error() {
        let provider = Arc::new(RecordingProvider {
            empty: true,
            ..Default::default()
        });
        let client = ChatClient::new(provider, "m1");

        let err = client.send("ping", &[]).await.unwrap_err();
        assert!(matches!(err, LLMError::EmptyResponse));
    }
}
