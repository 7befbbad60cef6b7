//! Chat API handlers, mounted under `/api`.

mod chat;
mod providers;
mod sessions;

pub use chat::chat;
pub use providers::{list_models, list_providers};
pub use sessions::{clear_chat, create_conversation, end_chat, list_sessions};
