//! Conversation command handlers.

use anyhow::{Context, Result};
use esi_core::core::ConversationId;
use esi_core::store::{FileStore, MessageStore};

use crate::render;

pub fn list() -> Result<()> {
    let conversations = FileStore::open_default()
        .list()
        .context("list conversations")?;
    if conversations.is_empty() {
        println!("No conversations found.");
    } else {
        for info in conversations {
            println!(
                "{}  {}  {}",
                info.display_title(),
                info.id,
                info.modified_display()
            );
        }
    }
    Ok(())
}

pub fn show(id: &str) -> Result<()> {
    let id = ConversationId::parse(id)?;
    let messages = FileStore::open_default()
        .get_messages(&id)
        .with_context(|| format!("load conversation '{id}'"))?;
    if messages.is_empty() {
        println!("Conversation '{id}' is empty or not found.");
    } else {
        for message in messages {
            println!("{}", render::format_stored(&message));
        }
    }
    Ok(())
}

pub fn delete(id: &str) -> Result<()> {
    let id = ConversationId::parse(id)?;
    FileStore::open_default()
        .delete(&id)
        .with_context(|| format!("delete conversation '{id}'"))?;
    println!("Deleted conversation {id}");
    Ok(())
}
