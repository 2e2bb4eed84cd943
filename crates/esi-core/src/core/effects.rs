//! Side effects requested by the chat reducer.
//!
//! The reducer never performs I/O; it returns these for `ChatRuntime` to
//! execute.

use std::path::PathBuf;

use crate::backend::StreamRequest;
use crate::core::transcript::Role;
use crate::core::turn::{ConversationId, TurnId};

#[derive(Debug, Clone, PartialEq)]
pub enum ChatEffect {
    /// Fire-and-forget persistence of a finished message.
    SaveMessage {
        conversation: ConversationId,
        role: Role,
        content: String,
    },

    /// Open the event stream for a new turn.
    OpenStream { turn: TurnId, request: StreamRequest },

    /// Close the transport of a turn that is no longer wanted.
    CancelStream { turn: TurnId },

    /// Fetch the figures produced by a completed turn.
    FetchFigures { turn: TurnId },

    UploadFile {
        conversation: Option<ConversationId>,
        path: PathBuf,
    },
}
