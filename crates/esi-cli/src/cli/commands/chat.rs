//! Interactive chat handler.

use std::io::Write;

use anyhow::{Context, Result};
use esi_core::artifacts::export_artifacts;
use esi_core::config::{Config, Settings};
use esi_core::core::ConversationId;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::render::TranscriptRenderer;
use crate::repl::{self, Input};
use crate::session::{ChatSession, SessionOptions};

const PROMPT: &str = "you> ";

pub async fn run(config: &Config, options: SessionOptions) -> Result<()> {
    let resumed = options.conversation.is_some();
    let mut session = ChatSession::start(config, options)
        .await
        .context("start session")?;
    let mut renderer = TranscriptRenderer::new();

    if resumed {
        renderer.replay(session.runtime.state());
    }
    if let Some(id) = &session.runtime.state().conversation {
        eprintln!("Conversation {id}. Type /help for commands.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await.context("read input")? else {
            break;
        };

        let input = match repl::parse(&line) {
            Ok(input) => input,
            Err(message) => {
                eprintln!("{message}");
                continue;
            }
        };

        match input {
            Input::Empty => {}
            Input::Quit => break,
            Input::Message(text) => run_turn(&mut session, &mut renderer, text).await,
            Input::Help => println!("{}", repl::help_text()),
            Input::New => {
                let id = session.new_conversation();
                renderer.reset(session.runtime.state());
                eprintln!("Started conversation {id}");
            }
            Input::Open(id) => open(&mut session, &mut renderer, id).await,
            Input::List => list(&session),
            Input::Upload(path) => {
                eprintln!("Uploading {}…", path.display());
                renderer.reset(session.runtime.state());
                session.runtime.upload(path);
                session
                    .runtime
                    .run_until_settled(|state| renderer.observe(state))
                    .await;
            }
            Input::Model(model) => change_settings(&mut session, |s| s.model = model),
            Input::Temperature(value) => change_settings(&mut session, |s| s.temperature = value),
            Input::Verbosity(value) => change_settings(&mut session, |s| s.verbosity = value),
            Input::ShowSettings => print_settings(&session.runtime.state().settings),
            Input::SaveSettings => match Config::save_settings(&session.runtime.state().settings) {
                Ok(()) => eprintln!("Settings saved as defaults."),
                Err(e) => eprintln!("Failed to save settings: {e:#}"),
            },
            Input::Artifacts => {
                let panel = &session.runtime.state().panel;
                if panel.is_visible() {
                    renderer.print_panel(panel);
                } else {
                    eprintln!("No artifacts for the last turn.");
                }
            }
            Input::Export(dir) => {
                let panel = &session.runtime.state().panel;
                if !panel.is_visible() {
                    eprintln!("No artifacts to export.");
                    continue;
                }
                match export_artifacts(panel.artifacts(), &dir) {
                    Ok(paths) => {
                        for path in paths {
                            println!("{}", path.display());
                        }
                    }
                    Err(e) => eprintln!("Export failed: {e:#}"),
                }
            }
        }
    }

    session.runtime.flush_persistence().await;
    tracing::info!("chat session ended");
    println!("Goodbye!");
    Ok(())
}

fn prompt() {
    let mut err = std::io::stderr();
    let _ = write!(err, "{PROMPT}");
    let _ = err.flush();
}

async fn run_turn(session: &mut ChatSession, renderer: &mut TranscriptRenderer, text: String) {
    renderer.reset(session.runtime.state());
    if !session.runtime.submit(text) {
        tracing::debug!("submission ignored");
        eprintln!("Message not sent.");
        return;
    }
    renderer.begin_turn(session.runtime.state());
    session
        .runtime
        .run_until_settled(|state| renderer.observe(state))
        .await;
    renderer.print_panel(&session.runtime.state().panel);
}

async fn open(session: &mut ChatSession, renderer: &mut TranscriptRenderer, id: String) {
    let opened = match ConversationId::parse(&id) {
        Ok(id) => session.open(id).await,
        Err(e) => Err(e),
    };
    match opened {
        Ok(()) => {
            renderer.replay(session.runtime.state());
            if let Some(id) = &session.runtime.state().conversation {
                eprintln!("Switched to conversation {id}");
            }
        }
        Err(e) => eprintln!("{e:#}"),
    }
}

fn list(session: &ChatSession) {
    if !session.saving() {
        eprintln!("Saving is disabled; no conversations to list.");
        return;
    }
    match session.list() {
        Ok(conversations) if conversations.is_empty() => println!("No conversations found."),
        Ok(conversations) => {
            let active = session.runtime.state().conversation.as_ref();
            for info in conversations {
                let marker = if Some(&info.id) == active { "*" } else { " " };
                println!(
                    "{marker} {}  {}  {}",
                    info.display_title(),
                    info.id,
                    info.modified_display()
                );
            }
        }
        Err(e) => eprintln!("{e:#}"),
    }
}

/// Applies a settings change if the result is valid.
fn change_settings(session: &mut ChatSession, edit: impl FnOnce(&mut Settings)) {
    let mut settings = session.runtime.state().settings.clone();
    edit(&mut settings);
    match settings.validate() {
        Ok(()) => {
            print_settings(&settings);
            session.runtime.update_settings(settings);
        }
        Err(e) => eprintln!("{e:#}"),
    }
}

fn print_settings(settings: &Settings) {
    eprintln!(
        "model={} temperature={} verbosity={} debug={}",
        settings.model, settings.temperature, settings.verbosity, settings.debug
    );
}
