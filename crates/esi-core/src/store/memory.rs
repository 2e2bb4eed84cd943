use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};

use super::{MessageStore, StoredMessage};
use crate::core::{ConversationId, Role};

/// Volatile store used when saving is disabled (`--no-save`) and in tests.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    conversations: Mutex<HashMap<ConversationId, Vec<StoredMessage>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for InMemoryStore {
    fn get_messages(&self, conversation: &ConversationId) -> Result<Vec<StoredMessage>> {
        let conversations = self
            .conversations
            .lock()
            .map_err(|e| anyhow!("conversation store lock poisoned: {e}"))?;
        Ok(conversations.get(conversation).cloned().unwrap_or_default())
    }

    fn save_message(&self, conversation: &ConversationId, role: Role, content: &str) -> Result<()> {
        let mut conversations = self
            .conversations
            .lock()
            .map_err(|e| anyhow!("conversation store lock poisoned: {e}"))?;
        conversations
            .entry(conversation.clone())
            .or_default()
            .push(StoredMessage::new(role, content));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_per_conversation() {
        let store = InMemoryStore::new();
        let a = ConversationId::new("a");
        let b = ConversationId::new("b");

        store.save_message(&a, Role::User, "q").unwrap();
        store.save_message(&a, Role::Ai, "r").unwrap();
        store.save_message(&b, Role::User, "other").unwrap();

        assert_eq!(
            store.get_messages(&a).unwrap(),
            vec![
                StoredMessage::new(Role::User, "q"),
                StoredMessage::new(Role::Ai, "r")
            ]
        );
        assert!(store.get_messages(&ConversationId::new("c")).unwrap().is_empty());
    }
}
