//! Conversation persistence collaborators.
//!
//! The controller only needs `get_messages` and `save_message`; `FileStore`
//! adds the listing and lifecycle operations the CLI uses.

mod conversation_log;
mod memory;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::core::{ConversationId, Role};

pub use conversation_log::{ConversationSummary, FileStore, TITLE_MAX_CHARS, short_conversation_id};
pub use memory::InMemoryStore;

/// A persisted message as returned by `get_messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub role: Role,
    pub content: String,
}

impl StoredMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Storage used by the chat runtime.
///
/// Calls are synchronous; the runtime runs them on the blocking pool.
pub trait MessageStore: Send + Sync {
    /// Returns the conversation's messages in the order they were saved.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn get_messages(&self, conversation: &ConversationId) -> Result<Vec<StoredMessage>>;

    /// Appends one message to the conversation.
    ///
    /// # Errors
    /// Returns an error if the message cannot be written.
    fn save_message(&self, conversation: &ConversationId, role: Role, content: &str) -> Result<()>;
}
