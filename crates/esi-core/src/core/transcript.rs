//! In-memory transcript of the active conversation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::StoredMessage;

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Ai,
    /// Local notices (upload results). Shown, never persisted.
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Ai => "ai",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transcript entry.
///
/// Content may grow only while the entry is unsealed; once sealed it is
/// immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    role: Role,
    content: String,
    position: usize,
    sealed: bool,
}

impl Message {
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Index of the entry within its transcript.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}

/// Ordered messages of the active conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    /// Builds a transcript from stored history; every entry is sealed.
    pub fn from_history(history: Vec<StoredMessage>) -> Self {
        let messages = history
            .into_iter()
            .enumerate()
            .map(|(position, m)| Message {
                role: m.role,
                content: m.content,
                position,
                sealed: true,
            })
            .collect();
        Self { messages }
    }

    /// Appends a sealed message and returns its position.
    pub fn push(&mut self, role: Role, content: impl Into<String>) -> usize {
        self.push_entry(role, content.into(), true)
    }

    /// Appends an empty, unsealed message that a stream will fill.
    pub fn push_placeholder(&mut self, role: Role) -> usize {
        self.push_entry(role, String::new(), false)
    }

    fn push_entry(&mut self, role: Role, content: String, sealed: bool) -> usize {
        let position = self.messages.len();
        self.messages.push(Message {
            role,
            content,
            position,
            sealed,
        });
        position
    }

    /// Appends text to an unsealed message. Returns false if the message is
    /// missing or sealed.
    pub fn append_to(&mut self, position: usize, text: &str) -> bool {
        match self.messages.get_mut(position) {
            Some(m) if !m.sealed => {
                m.content.push_str(text);
                true
            }
            _ => false,
        }
    }

    /// Replaces the content of an unsealed message.
    pub fn replace_content(&mut self, position: usize, content: impl Into<String>) -> bool {
        match self.messages.get_mut(position) {
            Some(m) if !m.sealed => {
                m.content = content.into();
                true
            }
            _ => false,
        }
    }

    pub fn seal(&mut self, position: usize) {
        if let Some(m) = self.messages.get_mut(position) {
            m.sealed = true;
        }
    }

    pub fn get(&self, position: usize) -> Option<&Message> {
        self.messages.get(position)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
