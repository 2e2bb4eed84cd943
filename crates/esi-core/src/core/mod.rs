//! Streaming response controller.
//!
//! State transitions live in a pure reducer (`update`) that returns effects;
//! `ChatRuntime` executes those effects as tasks that report back through an
//! inbox channel.

pub mod effects;
pub mod events;
pub mod runtime;
pub mod transcript;
pub mod turn;
pub mod update;

pub use effects::ChatEffect;
pub use events::ChatEvent;
pub use runtime::ChatRuntime;
pub use transcript::{Message, Role, Transcript};
pub use turn::{ConversationId, StreamTurn, TurnId, TurnOutcome, TurnSeq, TurnState};
pub use update::{ChatState, update};
