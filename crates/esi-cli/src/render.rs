//! Terminal rendering of chat state.
//!
//! Output contract:
//! - ai text (deltas), transcript replays and the artifact panel → stdout
//! - loading indicator, turn errors, system notices → stderr

use std::fmt::Write as _;
use std::io::{self, Stderr, Stdout, Write};

use esi_core::artifacts::ArtifactPanel;
use esi_core::core::{ChatState, Message, Role, TurnId, TurnOutcome, TurnState};
use esi_core::store::StoredMessage;

/// Renders one conversation's transcript incrementally.
///
/// `observe` must run after every applied event; it prints the suffix that
/// each delta added and reports the turn's error once the reducer records
/// it as failed.
pub struct TranscriptRenderer<O: Write = Stdout, E: Write = Stderr> {
    out: O,
    err: E,
    /// Transcript position of the ai message being streamed.
    streaming: Option<usize>,
    turn: Option<TurnId>,
    /// Text already printed for `streaming`.
    shown: String,
    /// Entries before this position are already on screen.
    seen: usize,
    failed: bool,
}

impl TranscriptRenderer {
    pub fn new() -> Self {
        Self::with_writers(io::stdout(), io::stderr())
    }
}

impl Default for TranscriptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: Write, E: Write> TranscriptRenderer<O, E> {
    pub fn with_writers(out: O, err: E) -> Self {
        Self {
            out,
            err,
            streaming: None,
            turn: None,
            shown: String::new(),
            seen: 0,
            failed: false,
        }
    }

    /// Starts tracking from the current end of the transcript.
    pub fn reset(&mut self, state: &ChatState) {
        self.streaming = None;
        self.turn = None;
        self.shown.clear();
        self.seen = state.transcript.len();
    }

    /// True if the last turn ended with an error.
    pub fn turn_failed(&self) -> bool {
        self.failed
    }

    /// Marks the turn that just started; prints the loading indicator.
    pub fn begin_turn(&mut self, state: &ChatState) {
        if let TurnState::Streaming(turn) = &state.turn {
            self.streaming = Some(turn.position);
            self.turn = Some(turn.id);
            self.shown.clear();
            self.failed = false;
            self.seen = turn.position + 1;
        }
        if let Some(label) = &state.loading {
            let _ = writeln!(self.err, "{label}");
        }
    }

    /// Prints whatever changed since the last call.
    pub fn observe(&mut self, state: &ChatState) {
        if let Some(position) = self.streaming
            && let Some(message) = state.transcript.get(position)
        {
            self.render_streaming(message, state.last_outcome);
        }

        let messages = state.transcript.messages();
        for message in messages.iter().skip(self.seen) {
            self.print_entry(message);
        }
        self.seen = self.seen.max(messages.len());
    }

    fn render_streaming(&mut self, message: &Message, outcome: Option<TurnOutcome>) {
        let content = message.content();
        let failed = matches!(
            (outcome, self.turn),
            (Some(TurnOutcome { turn, failed: true }), Some(ours)) if turn == ours
        );

        if failed {
            if !self.shown.is_empty() {
                let _ = writeln!(self.out);
            }
            let _ = writeln!(self.err, "{content}");
            self.failed = true;
            self.finish();
            return;
        }

        if let Some(suffix) = content.strip_prefix(self.shown.as_str())
            && !suffix.is_empty()
        {
            let _ = write!(self.out, "{suffix}");
            let _ = self.out.flush();
            self.shown.push_str(suffix);
        }
        if message.is_sealed() {
            if !self.shown.is_empty() {
                let _ = writeln!(self.out);
            }
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.streaming = None;
        self.shown.clear();
    }

    fn print_entry(&mut self, message: &Message) {
        match message.role() {
            Role::System => {
                let _ = writeln!(self.err, "[system] {}", message.content());
            }
            Role::User | Role::Ai => {
                let _ = writeln!(self.out, "{}", format_message(message));
            }
        }
    }

    /// Prints every entry of the transcript, e.g. after opening history.
    pub fn replay(&mut self, state: &ChatState) {
        for message in state.transcript.messages() {
            self.print_entry(message);
        }
        self.seen = state.transcript.len();
    }

    pub fn print_panel(&mut self, panel: &ArtifactPanel) {
        if let Some(text) = format_panel(panel) {
            let _ = writeln!(self.out, "{text}");
        }
    }
}

/// One transcript entry as `role> content`.
pub fn format_message(message: &Message) -> String {
    format!("{}> {}", message.role(), message.content())
}

pub fn format_stored(message: &StoredMessage) -> String {
    format!("{}> {}", message.role, message.content)
}

/// Formats the artifact panel, or `None` when it is hidden.
pub fn format_panel(panel: &ArtifactPanel) -> Option<String> {
    if !panel.is_visible() {
        return None;
    }
    let mut out = format!("── artifacts ({}) ──", panel.len());
    for (i, artifact) in panel.artifacts().iter().enumerate() {
        let _ = write!(out, "\n  {}. {}", i + 1, artifact.summary());
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use esi_core::artifacts::{CodeBlock, Figure, combine};
    use esi_core::backend::StreamEvent;
    use esi_core::config::Settings;
    use esi_core::core::{ChatEvent, ConversationId, TurnId, update};
    use serde_json::json;

    use super::*;

    type TestRenderer = TranscriptRenderer<Vec<u8>, Vec<u8>>;

    fn open_state() -> ChatState {
        let mut state = ChatState::new(Settings::default());
        update(
            &mut state,
            ChatEvent::ConversationOpened {
                id: ConversationId::new("c1"),
                history: vec![],
            },
        );
        state
    }

    fn start_turn(state: &mut ChatState, renderer: &mut TestRenderer) -> TurnId {
        renderer.reset(state);
        update(
            state,
            ChatEvent::Submit {
                text: "hi".to_string(),
            },
        );
        renderer.begin_turn(state);
        state.turn.active_turn().unwrap()
    }

    fn apply(state: &mut ChatState, renderer: &mut TestRenderer, turn: TurnId, event: StreamEvent) {
        update(state, ChatEvent::Stream { turn, event });
        renderer.observe(state);
    }

    fn text(buf: &[u8]) -> String {
        String::from_utf8_lossy(buf).into_owned()
    }

    #[test]
    fn test_deltas_print_incrementally() {
        let mut state = open_state();
        let mut renderer = TestRenderer::with_writers(Vec::new(), Vec::new());
        let turn = start_turn(&mut state, &mut renderer);

        for chunk in ["Hel", "lo ", "world"] {
            let event = StreamEvent::Delta {
                text: chunk.to_string(),
            };
            apply(&mut state, &mut renderer, turn, event);
        }
        apply(&mut state, &mut renderer, turn, StreamEvent::Done);

        assert_eq!(text(&renderer.out), "Hello world\n");
        assert_eq!(text(&renderer.err), "Thinking…\n");
        assert!(!renderer.turn_failed());
    }

    #[test]
    fn test_error_goes_to_stderr() {
        let mut state = open_state();
        let mut renderer = TestRenderer::with_writers(Vec::new(), Vec::new());
        let turn = start_turn(&mut state, &mut renderer);

        let delta = StreamEvent::Delta {
            text: "partial".to_string(),
        };
        apply(&mut state, &mut renderer, turn, delta);
        let error = StreamEvent::Error {
            message: "timeout".to_string(),
        };
        apply(&mut state, &mut renderer, turn, error);

        assert_eq!(text(&renderer.out), "partial\n");
        assert!(text(&renderer.err).ends_with("Error: timeout\n"));
        assert!(renderer.turn_failed());
    }

    #[test]
    fn test_error_sharing_the_streamed_prefix_is_reported() {
        let mut state = open_state();
        let mut renderer = TestRenderer::with_writers(Vec::new(), Vec::new());
        let turn = start_turn(&mut state, &mut renderer);

        let delta = StreamEvent::Delta {
            text: "Err".to_string(),
        };
        apply(&mut state, &mut renderer, turn, delta);
        let error = StreamEvent::Error {
            message: "timeout".to_string(),
        };
        apply(&mut state, &mut renderer, turn, error);

        assert_eq!(text(&renderer.out), "Err\n");
        assert!(text(&renderer.err).ends_with("Error: timeout\n"));
        assert!(renderer.turn_failed());
    }

    #[test]
    fn test_answer_that_looks_like_an_error_is_not_a_failure() {
        let mut state = open_state();
        let mut renderer = TestRenderer::with_writers(Vec::new(), Vec::new());
        let turn = start_turn(&mut state, &mut renderer);

        let delta = StreamEvent::Delta {
            text: "Error: none found".to_string(),
        };
        apply(&mut state, &mut renderer, turn, delta);
        apply(&mut state, &mut renderer, turn, StreamEvent::Done);

        assert_eq!(text(&renderer.out), "Error: none found\n");
        assert!(!renderer.turn_failed());
    }

    #[test]
    fn test_error_before_any_delta_is_reported() {
        let mut state = open_state();
        let mut renderer = TestRenderer::with_writers(Vec::new(), Vec::new());
        let turn = start_turn(&mut state, &mut renderer);

        apply(&mut state, &mut renderer, turn, StreamEvent::transport_failure());

        assert!(text(&renderer.out).is_empty());
        assert!(text(&renderer.err).ends_with("Error: streaming failed\n"));
        assert!(renderer.turn_failed());
    }

    #[test]
    fn test_system_notices_go_to_stderr() {
        let mut state = open_state();
        let mut renderer = TestRenderer::with_writers(Vec::new(), Vec::new());
        renderer.reset(&state);

        let conversation = state.conversation.clone();
        update(
            &mut state,
            ChatEvent::UploadCompleted {
                conversation,
                file: "notes.md".to_string(),
                result: Ok("indexed".to_string()),
            },
        );
        renderer.observe(&state);

        assert!(text(&renderer.out).is_empty());
        assert_eq!(text(&renderer.err), "[system] Uploaded notes.md: indexed\n");
    }

    #[test]
    fn test_format_panel_lists_artifacts_in_order() {
        let panel = combine(
            vec![CodeBlock::new("python", "x = 1\n")],
            vec![Figure(json!({"layout": {"title": "Revenue"}}))],
        );

        let text = format_panel(&panel).unwrap();
        assert_eq!(
            text,
            "── artifacts (2) ──\n  1. code (python, 1 line)\n  2. plot \"Revenue\""
        );
    }

    #[test]
    fn test_hidden_panel_prints_nothing() {
        assert!(format_panel(&ArtifactPanel::default()).is_none());
    }
}
