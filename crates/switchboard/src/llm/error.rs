//! LLM error types.

use thiserror::Error;

/// Errors that can occur when building or calling an upstream LLM client.
#[derive(Debug, Error)]
pub enum LLMError {
    /// HTTP request failed
    #[error("http request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// API returned an error response
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// No credential was found for a provider that needs one
    #[error("no API key for provider '{provider}': set {env}")]
    MissingApiKey { provider: String, env: String },

    /// API answered successfully but without any reply content
    #[error("api returned an empty response")]
    EmptyResponse,
}

impl LLMError {
    pub fn missing_api_key(provider: impl Into<String>, env: impl Into<String>) -> Self {
        Self::MissingApiKey {
            provider: provider.into(),
            env: env.into(),
        }
    }

    /// Pass a successful response through, turning any other status into [`LLMError::Api`].
    pub(crate) async fn check(response: reqwest::Response) -> Result<reqwest::Response, Self> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::Api {
            status: status.as_u16(),
            message: api_error_message(&body),
        })
    }
}

/// The `error.message` field both OpenAI-style and Anthropic error bodies carry, or the raw body.
fn api_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_message_prefers_structured_field() {
        let openai = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(api_error_message(openai), "Incorrect API key provided");

        let anthropic = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(api_error_message(anthropic), "Overloaded");

        assert_eq!(api_error_message("Bad Gateway"), "Bad Gateway");
    }
}
