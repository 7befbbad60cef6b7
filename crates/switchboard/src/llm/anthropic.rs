//! Anthropic LLM provider with native API format.

use async_trait::async_trait;
use reqwest::Client;

use super::error::LLMError;
use super::provider::LLMProvider;
use super::types::{ChatRequest, ChatResponse, Choice, Message, Role, Usage};

/// Reply budget used when the request doesn't carry one; the messages API requires it.
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic provider with native API format.
pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    api_key: String,
    api_version: String,
}

impl AnthropicProvider {
    pub const DEFAULT_API_VERSION: &'static str = "2023-06-01";

    pub fn new(client: Client, api_key: String, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            api_version: Self::DEFAULT_API_VERSION.to_string(),
        }
    }
}

#[async_trait]
impl LLMProvider for AnthropicProvider {
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&to_request(&request))
            .send()
            .await?;

        let body: Response = LLMError::check(response).await?.json().await?;
        Ok(from_response(body))
    }
}

// --- Request/Response types ---

#[derive(serde::Serialize)]
struct Request {
    model: String,
    max_tokens: u32,
    messages: Vec<RequestMessage>,
}

#[derive(Debug, serde::Serialize, PartialEq, Eq)]
struct RequestMessage {
    role: &'static str,
    content: String,
}

#[derive(serde::Deserialize)]
struct Response {
    id: String,
    content: Vec<Content>,
    stop_reason: Option<String>,
    usage: Option<ResponseUsage>,
}

#[derive(serde::Deserialize)]
struct Content {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(serde::Deserialize)]
struct ResponseUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// --- Conversions ---

/// Build a messages API request.
///
/// The conversation must open with a user turn, and adjacent turns with the same
/// role are joined, since chunked messages arrive as several user turns in a row.
fn to_request(request: &ChatRequest) -> Request {
    let mut messages: Vec<RequestMessage> = Vec::with_capacity(request.messages.len());

    for msg in &request.messages {
        if messages.is_empty() && msg.role == Role::Assistant {
            continue;
        }
        match messages.last_mut() {
            Some(last) if last.role == msg.role.as_str() => last.content.push_str(&msg.content),
            _ => messages.push(RequestMessage {
                role: msg.role.as_str(),
                content: msg.content.clone(),
            }),
        }
    }

    Request {
        model: request.model.clone(),
        max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        messages,
    }
}

fn from_response(response: Response) -> ChatResponse {
    let content = response
        .content
        .into_iter()
        .filter(|c| c.content_type == "text")
        .map(|c| c.text)
        .collect::<Vec<_>>()
        .join("");

    ChatResponse {
        id: response.id,
        choices: vec![Choice {
            index: 0,
            message: Message::assistant(content),
            finish_reason: response.stop_reason,
        }],
        usage: response.usage.map(|u| Usage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        }),
    }
}
