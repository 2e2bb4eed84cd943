//! CLI command handlers.

pub mod ask;
pub mod chat;
pub mod config;
pub mod conversations;
pub mod upload;
