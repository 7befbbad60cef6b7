//! LLM provider clients for chat completions.

mod anthropic;
mod client;
mod error;
mod openai;
mod provider;
mod registry;
mod types;

pub use client::{ChatClient, ClientFactory, UpstreamClient};
pub use error::LLMError;
pub use provider::{ApiKind, LLMProvider};
pub use registry::{ProviderRegistry, ProviderSettings, defaults};
pub use types::{ChatRequest, ChatResponse, Choice, Message, Role, Usage};
