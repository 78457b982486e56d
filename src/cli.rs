use crate::model::{RunConfig, RunOutcome, RunRequest};
use crate::orchestrator::{self, Session, UiCommand};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Output routing for stdout/stderr writer.
#[derive(Debug, PartialEq)]
enum OutputChunk {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputChunk>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputChunk>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = stdout.lock();
        let mut err = stderr.lock();

        while let Some(chunk) = rx.blocking_recv() {
            match chunk {
                OutputChunk::Stdout(text) => {
                    let _ = out.write_all(text.as_bytes());
                }
                OutputChunk::Stderr(text) => {
                    let _ = err.write_all(text.as_bytes());
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "scriptpad",
    version,
    about = "Edit a script, run it with an external interpreter, and watch its output"
)]
pub struct Cli {
    /// Interpreter or compiler launched for each run
    #[arg(long, default_value = "kotlinc")]
    pub interpreter: String,

    /// Argument passed to the interpreter before the script path (repeatable)
    #[arg(
        long = "interpreter-arg",
        value_name = "ARG",
        default_values_t = vec!["-script".to_string()],
        allow_hyphen_values = true
    )]
    pub interpreter_args: Vec<String>,

    /// File the editor text is written to before each run
    #[arg(long, default_value = "src/script_files/script.kts")]
    pub script_path: PathBuf,

    /// File the script's stdout is redirected into
    #[arg(long, default_value = "output.txt")]
    pub stdout_path: PathBuf,

    /// File the script's stderr is redirected into
    #[arg(long, default_value = "errors.txt")]
    pub stderr_path: PathBuf,

    /// Working directory for the interpreter (defaults to the current directory)
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// How often the capture files are re-read
    #[arg(long, default_value = "100ms", value_parser = parse_poll_interval)]
    pub poll_interval: humantime::Duration,

    /// Time between SIGTERM and SIGKILL when stopping a run (0 kills immediately)
    #[arg(long, default_value = "250ms")]
    pub kill_grace: humantime::Duration,

    /// Prefill the editor with this file
    #[arg(long, value_name = "FILE")]
    pub load: Option<PathBuf>,

    /// Run this script once without the TUI, print its output, and exit with its code
    #[arg(long, value_name = "FILE")]
    pub run: Option<PathBuf>,

    /// With --run: print the run outcome as JSON instead of raw output
    #[arg(long, requires = "run")]
    pub json: bool,

    /// Log file for interactive mode
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

fn parse_poll_interval(s: &str) -> std::result::Result<humantime::Duration, String> {
    let period: humantime::Duration = s.parse().map_err(|e: humantime::DurationError| e.to_string())?;
    if period.is_zero() {
        return Err("poll interval must be greater than zero".into());
    }
    Ok(period)
}

/// Whether this invocation runs without the TUI.
pub fn is_headless(args: &Cli) -> bool {
    args.run.is_some() || cfg!(not(feature = "tui"))
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        interpreter: args.interpreter.clone(),
        interpreter_args: args.interpreter_args.clone(),
        script_path: args.script_path.clone(),
        stdout_path: args.stdout_path.clone(),
        stderr_path: args.stderr_path.clone(),
        work_dir: args.work_dir.clone(),
        poll_interval: args.poll_interval.into(),
        kill_grace: args.kill_grace.into(),
    }
}

/// Run the selected mode and return the process exit code.
pub async fn run(args: Cli) -> Result<i32> {
    if let Some(script) = args.run.clone() {
        return run_headless(&args, &script).await;
    }

    #[cfg(feature = "tui")]
    {
        crate::tui::run(args).await?;
        Ok(0)
    }
    #[cfg(not(feature = "tui"))]
    {
        // Fallback when built without TUI support.
        match args.load.clone() {
            Some(script) => run_headless(&args, &script).await,
            None => Err(anyhow::anyhow!(
                "built without TUI support; pass --run <FILE> to run a script"
            )),
        }
    }
}

async fn run_headless(args: &Cli, script: &Path) -> Result<i32> {
    let cfg = build_config(args);
    let source = tokio::fs::read_to_string(script)
        .await
        .with_context(|| format!("read script {}", script.display()))?;

    let outcome = execute_once(&cfg, source).await?;
    let code = orchestrator::process_exit_code(&outcome.status);

    let (out_tx, out_handle) = spawn_output_writer();
    for chunk in render_outcome(outcome, args.json)? {
        let _ = out_tx.send(chunk);
    }
    drop(out_tx);
    let _ = out_handle.await;

    Ok(code)
}

/// Run `source` once through a fresh session; Ctrl-C stops it.
async fn execute_once(cfg: &RunConfig, source: String) -> Result<RunOutcome> {
    let (mut session, _events) = Session::start(cfg);
    let started_at = time::OffsetDateTime::now_utc();
    let clock = std::time::Instant::now();
    let run_id = 1;

    session
        .cmd_tx
        .send(UiCommand::Run(RunRequest::new(run_id, source)))
        .context("run controller stopped")?;

    let status = tokio::select! {
        status = session.wait_settled(run_id) => status?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(run_id, "ctrl-c received, stopping run");
            let _ = session.cmd_tx.send(UiCommand::Stop);
            session.wait_settled(run_id).await?
        }
    };
    let elapsed = clock.elapsed();

    // Final read so the printed output is not one poll interval stale.
    let snapshot = session.read_output_now().await;
    session.shutdown().await?;

    Ok(orchestrator::build_outcome(cfg, run_id, status, started_at, elapsed, snapshot))
}

/// JSON goes to stdout alone; otherwise the captures pass through and the
/// summary trails on stderr.
fn render_outcome(outcome: RunOutcome, json: bool) -> Result<Vec<OutputChunk>> {
    if json {
        let json = serde_json::to_string_pretty(&outcome)?;
        return Ok(vec![OutputChunk::Stdout(format!("{json}\n"))]);
    }
    let summary = crate::text_summary::build_text_summary(&outcome);
    let mut chunks = vec![
        OutputChunk::Stdout(outcome.stdout),
        OutputChunk::Stderr(outcome.stderr),
    ];
    chunks.extend(
        summary
            .lines
            .into_iter()
            .map(|line| OutputChunk::Stderr(format!("{line}\n"))),
    );
    Ok(chunks)
}
