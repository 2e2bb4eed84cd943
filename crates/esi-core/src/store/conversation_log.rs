//! JSONL conversation log.
//!
//! Each conversation is stored as `{id}.jsonl` under the conversations
//! directory. The first line is a meta entry; every following line is one
//! message.
//!
//! ```jsonl
//! { "type": "meta", "schema_version": 1, "ts": "2026-03-02T10:00:00Z" }
//! { "type": "message", "role": "user", "content": "...", "ts": "..." }
//! { "type": "message", "role": "ai", "content": "...", "ts": "..." }
//! ```

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{MessageStore, StoredMessage};
use crate::config::paths::conversations_dir;
use crate::core::{ConversationId, Role};

/// Current schema version for new conversation files.
pub const SCHEMA_VERSION: u32 = 1;

/// Titles are cut to this many characters.
pub const TITLE_MAX_CHARS: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LogEntry {
    Meta {
        schema_version: u32,
        ts: String,
    },
    Message {
        role: Role,
        content: String,
        ts: String,
    },
}

impl LogEntry {
    fn meta() -> Self {
        Self::Meta {
            schema_version: SCHEMA_VERSION,
            ts: timestamp(),
        }
    }

    fn message(role: Role, content: &str) -> Self {
        Self::Message {
            role,
            content: content.to_string(),
            ts: timestamp(),
        }
    }
}

/// Returns an RFC3339 UTC timestamp string.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// Returns a shortened conversation ID for display.
pub fn short_conversation_id(id: &str) -> String {
    if id.chars().count() > 8 {
        format!("{}…", id.chars().take(8).collect::<String>())
    } else {
        id.to_string()
    }
}

fn make_title(first_user_message: &str) -> Option<String> {
    let trimmed = first_user_message.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.chars().take(TITLE_MAX_CHARS).collect())
    }
}

/// Summary information about a saved conversation.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub id: ConversationId,
    pub title: Option<String>,
    pub message_count: usize,
    pub modified: Option<SystemTime>,
}

impl ConversationSummary {
    /// Returns the title, or the short ID when the conversation has none.
    pub fn display_title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| short_conversation_id(self.id.as_str()))
    }

    /// Formats the modification time as `YYYY-MM-DD HH:MM` (UTC).
    pub fn modified_display(&self) -> String {
        self.modified.map_or_else(
            || "-".to_string(),
            |time| {
                let datetime: DateTime<Utc> = time.into();
                datetime.format("%Y-%m-%d %H:%M").to_string()
            },
        )
    }
}

/// File-backed conversation store.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store rooted at `{ESI_HOME}/conversations`.
    pub fn open_default() -> Self {
        Self::new(conversations_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `id`; ids that could leave the directory are rejected.
    fn path_for(&self, id: &ConversationId) -> Result<PathBuf> {
        if !ConversationId::is_well_formed(id.as_str()) {
            bail!("Invalid conversation id: {id}");
        }
        Ok(self.dir.join(format!("{}.jsonl", id.as_str())))
    }

    pub fn exists(&self, id: &ConversationId) -> bool {
        self.path_for(id).is_ok_and(|path| path.exists())
    }

    /// Lists saved conversations, newest first.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<ConversationSummary>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut conversations = Vec::new();
        for entry in fs::read_dir(&self.dir).context("Failed to read conversations directory")? {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.extension().is_some_and(|ext| ext == "jsonl")
                && let Some(stem) = path.file_stem()
                && let Ok(id) = ConversationId::parse(&stem.to_string_lossy())
            {
                let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
                let messages = read_messages(&path).unwrap_or_default();
                let title = messages
                    .iter()
                    .find(|m| m.role == Role::User)
                    .and_then(|m| make_title(&m.content));

                conversations.push(ConversationSummary {
                    id,
                    title,
                    message_count: messages.len(),
                    modified,
                });
            }
        }

        conversations.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(conversations)
    }

    /// Returns the most recently modified conversation, if any.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be read.
    pub fn latest(&self) -> Result<Option<ConversationId>> {
        Ok(self.list()?.into_iter().next().map(|s| s.id))
    }

    /// Deletes a conversation file.
    ///
    /// # Errors
    /// Returns an error if the conversation does not exist or cannot be
    /// removed.
    pub fn delete(&self, id: &ConversationId) -> Result<()> {
        let path = self.path_for(id)?;
        if !path.exists() {
            bail!("Conversation not found: {id}");
        }
        fs::remove_file(&path)
            .with_context(|| format!("Failed to delete {}", path.display()))?;
        tracing::debug!(conversation = %id, "conversation deleted");
        Ok(())
    }

    /// Writes the meta line for a conversation that has no file yet.
    fn ensure_file(&self, id: &ConversationId) -> Result<PathBuf> {
        let path = self.path_for(id)?;
        if !path.exists() {
            fs::create_dir_all(&self.dir).context("Failed to create conversations directory")?;
            append_entry(&path, &LogEntry::meta())?;
        }
        Ok(path)
    }
}

impl MessageStore for FileStore {
    fn get_messages(&self, conversation: &ConversationId) -> Result<Vec<StoredMessage>> {
        read_messages(&self.path_for(conversation)?)
    }

    fn save_message(&self, conversation: &ConversationId, role: Role, content: &str) -> Result<()> {
        let path = self.ensure_file(conversation)?;
        append_entry(&path, &LogEntry::message(role, content))
    }
}

fn append_entry(path: &Path, entry: &LogEntry) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open conversation file")?;

    let json = serde_json::to_string(entry).context("Failed to serialize entry")?;
    writeln!(file, "{json}").context("Failed to write to conversation file")?;
    Ok(())
}

/// Reads message entries; unparseable lines are skipped.
fn read_messages(path: &Path) -> Result<Vec<StoredMessage>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = fs::File::open(path).context("Failed to open conversation file")?;
    let reader = BufReader::new(file);
    let mut messages = Vec::new();

    for line in reader.lines() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(LogEntry::Message { role, content, .. }) = serde_json::from_str(&line) {
            messages.push(StoredMessage { role, content });
        }
    }

    Ok(messages)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_first_save_writes_meta_line() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("conversations"));
        let id = ConversationId::generate();
        assert!(!store.exists(&id));

        store.save_message(&id, Role::User, "hello").unwrap();

        let contents = fs::read_to_string(store.path_for(&id).unwrap()).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "meta");
        assert_eq!(first["schema_version"], SCHEMA_VERSION);
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["role"], "user");
        assert_eq!(second["content"], "hello");
    }

    #[test]
    fn test_save_and_get_in_order() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = ConversationId::new("c1");

        store.save_message(&id, Role::User, "plot revenue").unwrap();
        store
            .save_message(&id, Role::Ai, "```python\nfig.show()\n```")
            .unwrap();

        assert_eq!(
            store.get_messages(&id).unwrap(),
            vec![
                StoredMessage::new(Role::User, "plot revenue"),
                StoredMessage::new(Role::Ai, "```python\nfig.show()\n```"),
            ]
        );
    }

    #[test]
    fn test_list_newest_first_with_titles() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let older = ConversationId::new("older");
        let newer = ConversationId::new("newer");

        store
            .save_message(&older, Role::User, "  first question  ")
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        store.save_message(&newer, Role::Ai, "no user yet").unwrap();
        store.save_message(&newer, Role::User, &"x".repeat(80)).unwrap();

        let list = store.list().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, newer);
        assert_eq!(list[0].title.as_deref(), Some("x".repeat(60).as_str()));
        assert_eq!(list[0].message_count, 2);
        assert_eq!(list[1].title.as_deref(), Some("first question"));
    }

    #[test]
    fn test_untitled_conversation_shows_short_id() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = ConversationId::generate();
        store.save_message(&id, Role::Ai, "welcome").unwrap();

        let list = store.list().unwrap();
        assert_eq!(list[0].title, None);
        assert_eq!(
            list[0].display_title(),
            short_conversation_id(id.as_str())
        );
    }

    #[test]
    fn test_delete_removes_conversation() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = ConversationId::new("c1");
        store.save_message(&id, Role::User, "q").unwrap();

        store.delete(&id).unwrap();

        assert!(!store.exists(&id));
        assert!(store.list().unwrap().is_empty());
        assert!(store.delete(&id).is_err());
    }

    #[test]
    fn test_unparseable_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let id = ConversationId::new("c1");
        store.save_message(&id, Role::User, "q").unwrap();
        let path = store.path_for(&id).unwrap();
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("not json\n\n");
        fs::write(&path, contents).unwrap();
        store.save_message(&id, Role::Ai, "a").unwrap();

        assert_eq!(store.get_messages(&id).unwrap().len(), 2);
    }

    #[test]
    fn test_ids_cannot_escape_the_directory() {
        let root = tempdir().unwrap();
        let store = FileStore::new(root.path().join("conversations"));
        let id = ConversationId::new("../escaped");

        let err = store.save_message(&id, Role::User, "q").unwrap_err();
        assert!(err.to_string().contains("Invalid conversation id"));
        assert!(store.get_messages(&id).is_err());
        assert!(store.delete(&id).is_err());
        assert!(!store.exists(&id));
        assert!(!root.path().join("escaped.jsonl").exists());
    }

    #[test]
    fn test_list_skips_files_with_foreign_names() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store
            .save_message(&ConversationId::new("c1"), Role::User, "q")
            .unwrap();
        fs::write(dir.path().join("not an id.jsonl"), "").unwrap();

        let ids: Vec<_> = store.list().unwrap().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![ConversationId::new("c1")]);
    }

    #[test]
    fn test_missing_directory_lists_nothing() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
        assert!(store.latest().unwrap().is_none());
    }
}
