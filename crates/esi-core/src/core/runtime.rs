//! Chat runtime: owns the state, runs effects, applies inbox events.
//!
//! ## Inbox Pattern
//!
//! Effect handlers spawn tasks that send `ChatEvent`s to `inbox_tx`. The
//! front end pulls them with `next_event` and applies them with `dispatch`,
//! so every state mutation happens on the caller's task, one event at a time.
//!
//! Persistence goes through a single worker so messages are saved in the
//! order the reducer produced them.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendClient, StreamEvent, StreamRequest, upload_file_name};
use crate::config::Settings;
use crate::core::effects::ChatEffect;
use crate::core::events::ChatEvent;
use crate::core::transcript::Role;
use crate::core::turn::{ConversationId, TurnId};
use crate::core::update::{ChatState, update};
use crate::store::MessageStore;

type ChatEventSender = mpsc::UnboundedSender<ChatEvent>;
type ChatEventReceiver = mpsc::UnboundedReceiver<ChatEvent>;

enum PersistJob {
    Save {
        conversation: ConversationId,
        role: Role,
        content: String,
    },
    Flush(oneshot::Sender<()>),
}

pub struct ChatRuntime {
    state: ChatState,
    backend: BackendClient,
    store: Arc<dyn MessageStore>,
    inbox_tx: ChatEventSender,
    inbox_rx: ChatEventReceiver,
    /// Cancellation handles of open streams, keyed by turn.
    streams: HashMap<TurnId, CancellationToken>,
    persist_tx: mpsc::UnboundedSender<PersistJob>,
}

impl ChatRuntime {
    /// Creates a runtime with no active conversation.
    ///
    /// Must be called within a tokio runtime; the persistence worker is
    /// spawned here.
    pub fn new(backend: BackendClient, store: Arc<dyn MessageStore>, settings: Settings) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let persist_tx = spawn_persistence_worker(Arc::clone(&store));
        Self {
            state: ChatState::new(settings),
            backend,
            store,
            inbox_tx,
            inbox_rx,
            streams: HashMap::new(),
            persist_tx,
        }
    }

    pub fn state(&self) -> &ChatState {
        &self.state
    }

    pub fn backend(&self) -> &BackendClient {
        &self.backend
    }

    /// Loads a conversation's history and makes it active.
    ///
    /// A turn still streaming for the previous conversation is cancelled.
    ///
    /// # Errors
    /// Returns an error if the history cannot be read; the previous
    /// conversation stays active in that case.
    pub async fn open_conversation(&mut self, id: ConversationId) -> Result<()> {
        let store = Arc::clone(&self.store);
        let lookup = id.clone();
        let history = tokio::task::spawn_blocking(move || store.get_messages(&lookup))
            .await
            .context("History loader task failed")?
            .with_context(|| format!("Failed to load conversation {id}"))?;

        tracing::info!(conversation = %id, messages = history.len(), "conversation opened");
        self.dispatch(ChatEvent::ConversationOpened { id, history });
        Ok(())
    }

    pub fn close_conversation(&mut self) {
        self.dispatch(ChatEvent::ConversationClosed);
    }

    /// Submits user text to the active conversation.
    ///
    /// Returns false when the submission was ignored (blank text, no active
    /// conversation, or a turn already streaming).
    pub fn submit(&mut self, text: impl Into<String>) -> bool {
        let before = self.state.turn.active_turn();
        self.dispatch(ChatEvent::Submit { text: text.into() });
        let after = self.state.turn.active_turn();
        after.is_some() && after != before
    }

    pub fn update_settings(&mut self, settings: Settings) {
        self.dispatch(ChatEvent::SettingsChanged(settings));
    }

    pub fn upload(&mut self, path: impl Into<PathBuf>) {
        self.dispatch(ChatEvent::UploadRequested { path: path.into() });
    }

    /// Fetches loading-indicator phrases; failures keep the default phrase.
    pub async fn load_thinking_phrases(&mut self) {
        match self.backend.fetch_thinking_phrases().await {
            Ok(phrases) => self.dispatch(ChatEvent::ThinkingPhrasesLoaded { phrases }),
            Err(e) => tracing::warn!(error = %e, "failed to load thinking phrases"),
        }
    }

    /// Applies one event and executes the resulting effects.
    pub fn dispatch(&mut self, event: ChatEvent) {
        if let ChatEvent::Stream {
            turn,
            event: stream_event,
        } = &event
            && stream_event.is_terminal()
        {
            self.streams.remove(turn);
        }

        for effect in update(&mut self.state, event) {
            self.execute(effect);
        }
    }

    /// Waits for the next event reported by a spawned task.
    pub async fn next_event(&mut self) -> Option<ChatEvent> {
        self.inbox_rx.recv().await
    }

    /// Applies inbox events until no spawned work is outstanding, calling
    /// `observer` after each one.
    pub async fn run_until_settled<F>(&mut self, mut observer: F)
    where
        F: FnMut(&ChatState),
    {
        while self.state.is_busy() {
            let Some(event) = self.next_event().await else {
                break;
            };
            self.dispatch(event);
            observer(&self.state);
        }
    }

    /// Waits until every queued save has been attempted.
    pub async fn flush_persistence(&self) {
        let (tx, rx) = oneshot::channel();
        if self.persist_tx.send(PersistJob::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    fn execute(&mut self, effect: ChatEffect) {
        match effect {
            ChatEffect::SaveMessage {
                conversation,
                role,
                content,
            } => {
                let job = PersistJob::Save {
                    conversation,
                    role,
                    content,
                };
                if self.persist_tx.send(job).is_err() {
                    tracing::warn!("persistence worker stopped; message not saved");
                }
            }
            ChatEffect::OpenStream { turn, request } => self.spawn_stream(turn, request),
            ChatEffect::CancelStream { turn } => {
                if let Some(token) = self.streams.remove(&turn) {
                    token.cancel();
                }
            }
            ChatEffect::FetchFigures { turn } => {
                let backend = self.backend.clone();
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    let figures = match backend.fetch_figures().await {
                        Ok(figures) => figures,
                        Err(e) => {
                            tracing::warn!(
                                %turn,
                                error = %e,
                                "figure fetch failed; showing code artifacts only"
                            );
                            Vec::new()
                        }
                    };
                    let _ = tx.send(ChatEvent::FiguresFetched { turn, figures });
                });
            }
            ChatEffect::UploadFile { conversation, path } => {
                let backend = self.backend.clone();
                let tx = self.inbox_tx.clone();
                tokio::spawn(async move {
                    let file = upload_file_name(&path);
                    let result = backend.upload_file(&path).await.map_err(|e| {
                        tracing::warn!(%file, error = %e, "upload failed");
                        e.to_string()
                    });
                    let _ = tx.send(ChatEvent::UploadCompleted {
                        conversation,
                        file,
                        result,
                    });
                });
            }
        }
    }

    fn spawn_stream(&mut self, turn: TurnId, request: StreamRequest) {
        let token = CancellationToken::new();
        self.streams.insert(turn, token.clone());

        let backend = self.backend.clone();
        let tx = self.inbox_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {
                    tracing::debug!(%turn, "stream cancelled");
                }
                () = forward_stream(backend, request, turn, tx) => {}
            }
        });
    }
}

/// Reads one turn's stream and forwards its events to the inbox.
///
/// Any transport or protocol failure is reported as a single
/// `streaming failed` error event.
async fn forward_stream(
    backend: BackendClient,
    request: StreamRequest,
    turn: TurnId,
    tx: ChatEventSender,
) {
    let send = |event: StreamEvent| {
        let _ = tx.send(ChatEvent::Stream { turn, event });
    };

    let mut stream = match backend.open_stream(&request).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(%turn, error = %e, "failed to open stream");
            send(StreamEvent::transport_failure());
            return;
        }
    };

    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => {
                let terminal = event.is_terminal();
                send(event);
                if terminal {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(%turn, error = %e, "stream failed");
                send(StreamEvent::transport_failure());
                return;
            }
        }
    }

    send(StreamEvent::transport_failure());
}

/// Spawns the task that saves messages one at a time on the blocking pool.
fn spawn_persistence_worker(store: Arc<dyn MessageStore>) -> mpsc::UnboundedSender<PersistJob> {
    let (tx, mut rx) = mpsc::unbounded_channel::<PersistJob>();
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            match job {
                PersistJob::Save {
                    conversation,
                    role,
                    content,
                } => {
                    let store = Arc::clone(&store);
                    let saved = tokio::task::spawn_blocking(move || {
                        store.save_message(&conversation, role, &content)
                    })
                    .await;
                    match saved {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            let error = format!("{e:#}");
                            tracing::warn!(%error, "failed to save message");
                        }
                        Err(e) => tracing::warn!(error = %e, "save task panicked"),
                    }
                }
                PersistJob::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
    });
    tx
}
