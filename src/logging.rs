//! Tracing setup.
//!
//! The TUI owns the terminal, so in interactive mode logs go to a file through
//! a non-blocking writer; headless runs log to stderr.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Keep alive for the duration of the program; dropping it flushes the log file.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Default log file: `<cache dir>/scriptpad/scriptpad.log`.
pub fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("scriptpad")
        .join("scriptpad.log")
}

/// Install the global subscriber. `RUST_LOG` overrides the default filter:
/// `info` for the log file, `warn` on stderr so the script's own output stays readable.
pub fn init(target: LogTarget) -> Result<LoggingGuard> {
    let default_filter = match target {
        LogTarget::Stderr => "warn",
        LogTarget::File(_) => "info",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
                .try_init()
                .context("install tracing subscriber")?;
            Ok(LoggingGuard { _file_guard: None })
        }
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(writer).with_ansi(false))
                .try_init()
                .context("install tracing subscriber")?;
            tracing::info!(log_path = %path.display(), "logging initialized");
            Ok(LoggingGuard {
                _file_guard: Some(guard),
            })
        }
    }
}
