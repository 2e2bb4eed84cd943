//! Chat session wiring shared by `chat` and `ask`.

use std::sync::Arc;

use anyhow::{Context, Result};
use esi_core::backend::BackendClient;
use esi_core::config::{Config, Settings};
use esi_core::core::{ChatEvent, ChatRuntime, ConversationId};
use esi_core::store::{ConversationSummary, FileStore, InMemoryStore, MessageStore};

/// Resolved options for a session.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Explicit base URL (flag or `ESI_BASE_URL`); config is used otherwise.
    pub base_url: Option<String>,
    pub settings: Settings,
    pub conversation: Option<String>,
    pub save: bool,
}

/// A runtime plus the store behind it.
pub struct ChatSession {
    pub runtime: ChatRuntime,
    files: Option<FileStore>,
}

impl ChatSession {
    /// Builds the runtime and opens the requested (or a new) conversation.
    pub async fn start(config: &Config, options: SessionOptions) -> Result<Self> {
        let backend = backend_client(config, options.base_url.as_deref())?;

        let files = options.save.then(FileStore::open_default);
        let store: Arc<dyn MessageStore> = match &files {
            Some(files) => Arc::new(files.clone()),
            None => Arc::new(InMemoryStore::new()),
        };

        let mut runtime = ChatRuntime::new(backend, store, options.settings);
        runtime.load_thinking_phrases().await;

        let mut session = Self { runtime, files };
        match options.conversation {
            Some(id) => session.open(ConversationId::parse(&id)?).await?,
            None => {
                session.new_conversation();
            }
        }
        Ok(session)
    }

    pub fn saving(&self) -> bool {
        self.files.is_some()
    }

    /// Starts a fresh conversation and makes it active.
    ///
    /// Nothing is written until the first message is saved.
    pub fn new_conversation(&mut self) -> ConversationId {
        let id = ConversationId::generate();
        self.runtime.dispatch(ChatEvent::ConversationOpened {
            id: id.clone(),
            history: Vec::new(),
        });
        id
    }

    pub async fn open(&mut self, id: ConversationId) -> Result<()> {
        self.runtime.open_conversation(id).await
    }

    /// Lists saved conversations; empty when saving is disabled.
    pub fn list(&self) -> Result<Vec<ConversationSummary>> {
        match &self.files {
            Some(files) => files.list().context("list conversations"),
            None => Ok(Vec::new()),
        }
    }
}

/// Builds the backend client, honoring an explicit base URL first.
pub fn backend_client(config: &Config, base_url: Option<&str>) -> Result<BackendClient> {
    match base_url {
        Some(url) => BackendClient::with_base_url(&config.server, url),
        None => BackendClient::new(&config.server),
    }
}
