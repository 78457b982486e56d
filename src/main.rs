mod cli;
mod engine;
mod error;
mod logging;
mod model;
mod orchestrator;
mod store;
#[cfg(test)]
mod testutil;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let headless = cli::is_headless(&args);

    let target = if headless {
        logging::LogTarget::Stderr
    } else {
        logging::LogTarget::File(args.log_file.clone().unwrap_or_else(logging::default_log_path))
    };
    let log_guard = logging::init(target)?;

    let code = cli::run(args).await?;
    if headless {
        // Mirror the script's exit code; the guard is dropped first so logs are flushed.
        drop(log_guard);
        std::process::exit(code);
    }
    Ok(())
}
