//! CLI entry and dispatch.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use esi_core::config::{self, Settings};
use esi_core::logging::{self, LogTarget};

use crate::session::SessionOptions;

mod commands;

#[derive(Parser)]
#[command(name = "esi")]
#[command(version)]
#[command(about = "Terminal client for the ESI research assistant")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// ESI server base URL (overrides the config file)
    #[arg(long, env = "ESI_BASE_URL", value_name = "URL", global = true)]
    base_url: Option<String>,

    #[command(flatten)]
    settings: SettingsArgs,

    #[command(flatten)]
    conversation_args: ConversationArgs,

    /// Write logs to stderr instead of the log file
    #[arg(long, global = true)]
    log_stderr: bool,
}

/// Request settings overrides shared by `chat` and `ask`.
#[derive(clap::Args, Debug, Clone, Default)]
struct SettingsArgs {
    /// Model identifier sent to the server
    #[arg(long, global = true)]
    model: Option<String>,

    /// Sampling temperature (0.0 - 1.0)
    #[arg(long, global = true)]
    temperature: Option<f32>,

    /// Answer verbosity (1 - 5)
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(1..=5))]
    verbosity: Option<u8>,

    /// Ask the server to log tool calls
    #[arg(long, global = true)]
    debug: bool,
}

impl SettingsArgs {
    fn apply(&self, settings: &Settings) -> Result<Settings> {
        let mut merged = settings.clone();
        if let Some(model) = &self.model {
            merged.model.clone_from(model);
        }
        if let Some(temperature) = self.temperature {
            merged.temperature = temperature;
        }
        if let Some(verbosity) = self.verbosity {
            merged.verbosity = verbosity;
        }
        if self.debug {
            merged.debug = true;
        }
        merged.validate().context("invalid settings override")?;
        Ok(merged)
    }
}

/// Conversation arguments for commands that run turns.
#[derive(clap::Args, Debug, Clone, Default)]
struct ConversationArgs {
    /// Continue an existing conversation by ID
    #[arg(long, value_name = "ID", global = true)]
    conversation: Option<String>,

    /// Do not save the conversation
    #[arg(long = "no-save", global = true)]
    no_save: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Interactive chat (default)
    Chat,

    /// Sends one prompt and prints the answer
    Ask {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,
    },

    /// Manage saved conversations
    Conversations {
        #[command(subcommand)]
        command: ConversationCommands,
    },

    /// Sends a file to the server's document store
    Upload {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConversationCommands {
    /// Lists saved conversations, newest first
    List,
    /// Shows a conversation's messages
    Show {
        #[arg(value_name = "CONVERSATION_ID")]
        id: String,
    },
    /// Deletes a conversation
    Delete {
        #[arg(value_name = "CONVERSATION_ID")]
        id: String,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let target = if cli.log_stderr {
        LogTarget::Stderr
    } else {
        LogTarget::File
    };
    let _log_guard = logging::init(target, &config::paths::logs_dir())?;

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;

    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = config::Config::load().context("load config")?;

    let Cli {
        command,
        base_url,
        settings,
        conversation_args,
        log_stderr: _,
    } = cli;

    let session_options = || -> Result<SessionOptions> {
        Ok(SessionOptions {
            base_url: base_url.clone(),
            settings: settings.apply(&config.settings)?,
            conversation: conversation_args.conversation.clone(),
            save: config.storage.save && !conversation_args.no_save,
        })
    };

    match command.unwrap_or(Commands::Chat) {
        Commands::Chat => commands::chat::run(&config, session_options()?).await,
        Commands::Ask { prompt } => commands::ask::run(&config, session_options()?, &prompt).await,
        Commands::Conversations { command } => match command {
            ConversationCommands::List => commands::conversations::list(),
            ConversationCommands::Show { id } => commands::conversations::show(&id),
            ConversationCommands::Delete { id } => commands::conversations::delete(&id),
        },
        Commands::Upload { path } => {
            commands::upload::run(&config, base_url.as_deref(), &path).await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
