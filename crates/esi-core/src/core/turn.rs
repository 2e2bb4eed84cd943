use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// Identifier of one submission. Every stream and figure event carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "turn-{}", self.0)
    }
}

/// How the most recent turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnOutcome {
    pub turn: TurnId,
    pub failed: bool,
}

#[derive(Debug, Default)]
pub struct TurnSeq {
    next: u64,
}

impl TurnSeq {
    pub fn next_id(&mut self) -> TurnId {
        let id = TurnId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

/// Opaque conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parses an id typed by the user.
    ///
    /// # Errors
    /// Returns an error unless the id is non-empty ASCII letters, digits,
    /// `-` or `_`. Ids name files on disk.
    pub fn parse(id: &str) -> Result<Self> {
        let id = id.trim();
        if !Self::is_well_formed(id) {
            bail!("Invalid conversation id '{id}': use letters, digits, '-' or '_'");
        }
        Ok(Self(id.to_string()))
    }

    pub fn is_well_formed(id: &str) -> bool {
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    /// Fresh random (UUID v4) identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConversationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConversationId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// The turn currently receiving stream events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTurn {
    pub id: TurnId,
    pub conversation: ConversationId,
    /// Transcript position of the ai placeholder.
    pub position: usize,
    pub accumulated: String,
}

/// Per-conversation turn lifecycle: `Idle -> Streaming -> Idle`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TurnState {
    #[default]
    Idle,
    Streaming(StreamTurn),
}

impl TurnState {
    pub fn is_streaming(&self) -> bool {
        matches!(self, TurnState::Streaming(_))
    }

    pub fn active_turn(&self) -> Option<TurnId> {
        match self {
            TurnState::Streaming(turn) => Some(turn.id),
            TurnState::Idle => None,
        }
    }

    /// Returns the streaming turn only if it is `id`.
    pub fn streaming_mut(&mut self, id: TurnId) -> Option<&mut StreamTurn> {
        match self {
            TurnState::Streaming(turn) if turn.id == id => Some(turn),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_seq_is_monotonic() {
        let mut seq = TurnSeq::default();
        let a = seq.next_id();
        let b = seq.next_id();
        assert!(b > a);
        assert_eq!(a, TurnId(0));
    }

    #[test]
    fn test_streaming_mut_matches_only_active_turn() {
        let mut state = TurnState::Streaming(StreamTurn {
            id: TurnId(4),
            conversation: ConversationId::new("c1"),
            position: 1,
            accumulated: String::new(),
        });

        assert!(state.streaming_mut(TurnId(3)).is_none());
        assert!(state.streaming_mut(TurnId(4)).is_some());
        assert_eq!(state.active_turn(), Some(TurnId(4)));
    }

    #[test]
    fn test_parse_rejects_path_like_ids() {
        assert_eq!(
            ConversationId::parse(" conv_1-a ").unwrap(),
            ConversationId::new("conv_1-a")
        );
        let generated = ConversationId::generate();
        assert!(ConversationId::parse(generated.as_str()).is_ok());

        for bad in ["", "../escaped", "a/b", "a\\b", "..", "x.jsonl"] {
            assert!(ConversationId::parse(bad).is_err(), "accepted {bad:?}");
        }
    }
}
