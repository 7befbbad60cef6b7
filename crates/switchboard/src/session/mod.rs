//! Session management: chunking, bounded memory and the session registry.

pub mod chunker;
mod error;
mod key;
mod memory;
mod registry;

pub use error::SessionError;
pub use key::{CONVERSATION_ID_PREFIX, ModelRef, SessionKey, new_conversation_id};
pub use memory::ConversationMemory;
pub use registry::{Session, SessionRegistry, SessionSpec, SessionSummary};
