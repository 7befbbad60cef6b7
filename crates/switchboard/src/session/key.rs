//! Session identity.

use std::fmt;

use serde::Serialize;
use ulid::Ulid;

/// Prefix for server-minted conversation ids.
pub const CONVERSATION_ID_PREFIX: &str = "conv_";

pub fn new_conversation_id() -> String {
    format!("{CONVERSATION_ID_PREFIX}{}", Ulid::new())
}

/// A provider and one of its models.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModelRef {
    pub provider: String,
    pub model: String,
}

impl ModelRef {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Identifies one session in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionKey {
    /// One shared conversation per provider/model pair.
    Model(ModelRef),
    /// An independent conversation; its model is bound when it is first created.
    Conversation(String),
}

impl SessionKey {
    pub fn model(provider: impl Into<String>, model: impl Into<String>) -> Self {
        SessionKey::Model(ModelRef::new(provider, model))
    }

    pub fn conversation(id: impl Into<String>) -> Self {
        SessionKey::Conversation(id.into())
    }

    /// A fresh conversation key with a unique id.
    pub fn new_conversation() -> Self {
        SessionKey::Conversation(new_conversation_id())
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKey::Model(model) => write!(f, "{model}"),
            SessionKey::Conversation(id) => write!(f, "conversation:{id}"),
        }
    }
}
