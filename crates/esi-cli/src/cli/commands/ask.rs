//! Ask command handler.

use anyhow::{Context, Result};
use esi_core::config::Config;

use crate::render::TranscriptRenderer;
use crate::session::{ChatSession, SessionOptions};

pub async fn run(config: &Config, options: SessionOptions, prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        anyhow::bail!("Prompt is empty");
    }

    let mut session = ChatSession::start(config, options)
        .await
        .context("start session")?;
    let runtime = &mut session.runtime;

    let mut renderer = TranscriptRenderer::new();
    renderer.reset(runtime.state());
    if !runtime.submit(prompt) {
        anyhow::bail!("Prompt was not sent");
    }
    renderer.begin_turn(runtime.state());
    runtime
        .run_until_settled(|state| renderer.observe(state))
        .await;

    renderer.print_panel(&runtime.state().panel);
    runtime.flush_persistence().await;

    if renderer.turn_failed() {
        anyhow::bail!("Turn failed");
    }
    Ok(())
}
