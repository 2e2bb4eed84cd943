//! Inputs to the chat reducer.
//!
//! User intents come from the front end; everything else is reported by
//! tasks the runtime spawned.

use std::path::PathBuf;

use crate::artifacts::Figure;
use crate::backend::StreamEvent;
use crate::config::Settings;
use crate::core::turn::{ConversationId, TurnId};
use crate::store::StoredMessage;

#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The user submitted text for the active conversation.
    Submit { text: String },

    /// A conversation's history finished loading and becomes active.
    ConversationOpened {
        id: ConversationId,
        history: Vec<StoredMessage>,
    },

    /// The active conversation was closed or deleted.
    ConversationClosed,

    /// New request settings for subsequent submissions.
    SettingsChanged(Settings),

    /// One event of the stream opened for `turn`.
    Stream { turn: TurnId, event: StreamEvent },

    /// Figure fetch for `turn` finished (failures arrive as an empty list).
    FiguresFetched { turn: TurnId, figures: Vec<Figure> },

    ThinkingPhrasesLoaded { phrases: Vec<String> },

    /// The user asked to send a file to the server.
    UploadRequested { path: PathBuf },

    UploadCompleted {
        conversation: Option<ConversationId>,
        file: String,
        result: Result<String, String>,
    },
}
