//! Chat reducer.
//!
//! `update` is the only place transcript, turn and artifact state change.
//! It never performs I/O; every side effect is returned as a `ChatEffect`.

use crate::artifacts::{ArtifactPanel, CodeBlock, combine, extract_code_blocks};
use crate::backend::{DEFAULT_THINKING_PHRASE, StreamEvent, StreamRequest};
use crate::config::Settings;
use crate::core::effects::ChatEffect;
use crate::core::events::ChatEvent;
use crate::core::transcript::{Role, Transcript};
use crate::core::turn::{ConversationId, StreamTurn, TurnId, TurnOutcome, TurnSeq, TurnState};
use crate::store::StoredMessage;

/// Code blocks of a completed turn waiting for its figures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingArtifacts {
    pub turn: TurnId,
    pub code_blocks: Vec<CodeBlock>,
}

/// Everything the controller owns.
#[derive(Debug, Default)]
pub struct ChatState {
    pub conversation: Option<ConversationId>,
    pub transcript: Transcript,
    pub turn: TurnState,
    pub panel: ArtifactPanel,
    pub pending_artifacts: Option<PendingArtifacts>,
    pub settings: Settings,
    /// Loading indicator label; `Some` while a turn streams.
    pub loading: Option<String>,
    pub thinking_phrases: Vec<String>,
    pub pending_uploads: usize,
    /// Set when a turn finishes; cleared by the next submission.
    pub last_outcome: Option<TurnOutcome>,
    turn_seq: TurnSeq,
}

impl ChatState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: settings.clamped(),
            ..Self::default()
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.turn.is_streaming()
    }

    /// True while any spawned work will still report back.
    pub fn is_busy(&self) -> bool {
        self.turn.is_streaming() || self.pending_artifacts.is_some() || self.pending_uploads > 0
    }

    fn thinking_phrase(&self, turn: TurnId) -> String {
        if self.thinking_phrases.is_empty() {
            return DEFAULT_THINKING_PHRASE.to_string();
        }
        let index = (turn.0 % self.thinking_phrases.len() as u64) as usize;
        self.thinking_phrases[index].clone()
    }

    /// Drops every trace of the current turn and panel.
    ///
    /// Returns a cancellation for a turn still streaming.
    fn detach(&mut self) -> Vec<ChatEffect> {
        let mut effects = Vec::new();
        if let TurnState::Streaming(turn) = std::mem::take(&mut self.turn) {
            tracing::debug!(turn = %turn.id, "cancelling stream on conversation change");
            effects.push(ChatEffect::CancelStream { turn: turn.id });
        }
        self.pending_artifacts = None;
        self.panel.clear();
        self.loading = None;
        self.last_outcome = None;
        effects
    }
}

/// Applies one event and returns the effects it requires.
pub fn update(state: &mut ChatState, event: ChatEvent) -> Vec<ChatEffect> {
    match event {
        ChatEvent::Submit { text } => handle_submit(state, text),
        ChatEvent::ConversationOpened { id, history } => handle_opened(state, id, history),
        ChatEvent::ConversationClosed => {
            let effects = state.detach();
            state.conversation = None;
            state.transcript.clear();
            effects
        }
        ChatEvent::SettingsChanged(settings) => {
            state.settings = settings.clamped();
            vec![]
        }
        ChatEvent::Stream { turn, event } => handle_stream_event(state, turn, event),
        ChatEvent::FiguresFetched { turn, figures } => {
            match state.pending_artifacts.take() {
                Some(pending) if pending.turn == turn => {
                    state.panel = combine(pending.code_blocks, figures);
                    tracing::debug!(%turn, artifacts = state.panel.len(), "artifact panel updated");
                }
                other => {
                    tracing::debug!(%turn, "dropping figures for stale turn");
                    state.pending_artifacts = other;
                }
            }
            vec![]
        }
        ChatEvent::ThinkingPhrasesLoaded { phrases } => {
            state.thinking_phrases = phrases;
            vec![]
        }
        ChatEvent::UploadRequested { path } => {
            state.pending_uploads += 1;
            vec![ChatEffect::UploadFile {
                conversation: state.conversation.clone(),
                path,
            }]
        }
        ChatEvent::UploadCompleted {
            conversation,
            file,
            result,
        } => {
            state.pending_uploads = state.pending_uploads.saturating_sub(1);
            if conversation != state.conversation {
                tracing::debug!(%file, "dropping upload result for inactive conversation");
                return vec![];
            }
            let notice = match result {
                Ok(message) => format!("Uploaded {file}: {message}"),
                Err(error) => format!("Upload failed: {error}"),
            };
            state.transcript.push(Role::System, notice);
            vec![]
        }
    }
}

fn handle_submit(state: &mut ChatState, text: String) -> Vec<ChatEffect> {
    if text.trim().is_empty() {
        return vec![];
    }
    let Some(conversation) = state.conversation.clone() else {
        tracing::debug!("ignoring submission without an active conversation");
        return vec![];
    };
    if let Some(active) = state.turn.active_turn() {
        tracing::debug!(turn = %active, "rejecting submission while a turn is streaming");
        return vec![];
    }

    state.panel.clear();
    state.pending_artifacts = None;
    state.last_outcome = None;

    let turn = state.turn_seq.next_id();
    state.transcript.push(Role::User, text.clone());
    let position = state.transcript.push_placeholder(Role::Ai);
    state.turn = TurnState::Streaming(StreamTurn {
        id: turn,
        conversation: conversation.clone(),
        position,
        accumulated: String::new(),
    });
    state.loading = Some(state.thinking_phrase(turn));

    tracing::info!(%turn, %conversation, model = %state.settings.model, "turn started");

    let request = StreamRequest::new(text.clone(), &state.settings);
    vec![
        ChatEffect::SaveMessage {
            conversation,
            role: Role::User,
            content: text,
        },
        ChatEffect::OpenStream { turn, request },
    ]
}

fn handle_opened(
    state: &mut ChatState,
    id: ConversationId,
    history: Vec<StoredMessage>,
) -> Vec<ChatEffect> {
    let effects = state.detach();
    state.transcript = Transcript::from_history(history);
    state.conversation = Some(id);
    effects
}

fn handle_stream_event(state: &mut ChatState, turn: TurnId, event: StreamEvent) -> Vec<ChatEffect> {
    let Some(active) = state.turn.streaming_mut(turn) else {
        tracing::debug!(%turn, ?event, "dropping event for stale turn");
        return vec![];
    };

    match event {
        StreamEvent::Delta { text } => {
            active.accumulated.push_str(&text);
            let position = active.position;
            state.transcript.append_to(position, &text);
            vec![]
        }
        StreamEvent::Done => {
            let TurnState::Streaming(finished) = std::mem::take(&mut state.turn) else {
                return vec![];
            };
            state.transcript.seal(finished.position);
            state.loading = None;
            state.last_outcome = Some(TurnOutcome {
                turn,
                failed: false,
            });

            let code_blocks = extract_code_blocks(&finished.accumulated);
            tracing::info!(
                %turn,
                chars = finished.accumulated.len(),
                code_blocks = code_blocks.len(),
                "turn completed"
            );
            state.pending_artifacts = Some(PendingArtifacts { turn, code_blocks });

            vec![
                ChatEffect::SaveMessage {
                    conversation: finished.conversation,
                    role: Role::Ai,
                    content: finished.accumulated,
                },
                ChatEffect::FetchFigures { turn },
            ]
        }
        StreamEvent::Error { message } => {
            let TurnState::Streaming(failed) = std::mem::take(&mut state.turn) else {
                return vec![];
            };
            state
                .transcript
                .replace_content(failed.position, format!("Error: {message}"));
            state.transcript.seal(failed.position);
            state.loading = None;
            state.last_outcome = Some(TurnOutcome { turn, failed: true });
            tracing::info!(%turn, %message, "turn failed");
            vec![]
        }
    }
}
