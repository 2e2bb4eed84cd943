//! Tracing setup.
//!
//! Stdout carries the transcript, so log output goes to a daily rolling file
//! under `$ESI_HOME/logs` unless the caller asks for stderr.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "warn,esi_core=info,esi=info";
const LOG_FILE_PREFIX: &str = "esi.log";

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Daily rolling file in the given logs directory.
    File,
    /// Standard error (useful when debugging the CLI itself).
    Stderr,
}

/// Builds the filter from `ESI_LOG`, then `RUST_LOG`, then the default.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("ESI_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global tracing subscriber.
///
/// The returned guard flushes buffered lines on drop; keep it alive for the
/// lifetime of the process.
///
/// # Errors
/// Returns an error if the log directory cannot be created or a global
/// subscriber is already installed.
pub fn init(target: LogTarget, logs_dir: &Path) -> Result<WorkerGuard> {
    let (writer, guard) = match target {
        LogTarget::File => {
            std::fs::create_dir_all(logs_dir).with_context(|| {
                format!("Failed to create log directory {}", logs_dir.display())
            })?;
            let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
            tracing_appender::non_blocking(appender)
        }
        LogTarget::Stderr => tracing_appender::non_blocking(std::io::stderr()),
    };

    let fmt_layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_ansi(matches!(target, LogTarget::Stderr))
        .compact();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(?target, "tracing initialized");
    Ok(guard)
}
