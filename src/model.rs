use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Program launched for every run, e.g. `kotlinc`.
    pub interpreter: String,
    /// Arguments placed before the script path.
    #[serde(default)]
    pub interpreter_args: Vec<String>,
    pub script_path: PathBuf,
    pub stdout_path: PathBuf,
    pub stderr_path: PathBuf,
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub kill_grace: Duration,
}

impl RunConfig {
    /// Render the command line for logs and the status bar.
    pub fn command_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.interpreter_args.len() + 2);
        parts.push(self.interpreter.clone());
        parts.extend(self.interpreter_args.iter().cloned());
        parts.push(self.script_path.display().to_string());
        parts.join(" ")
    }
}

/// Snapshot of the editor text taken when RUN is pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub run_id: u64,
    pub source: String,
}

impl RunRequest {
    pub fn new(run_id: u64, source: impl Into<String>) -> Self {
        Self {
            run_id,
            source: source.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running {
        run_id: u64,
        pid: Option<u32>,
    },
    Finished {
        run_id: u64,
        exit_code: i32,
    },
    /// Stopped explicitly, superseded by a newer run, or lost while waiting on it.
    Interrupted {
        run_id: u64,
    },
    /// The run never started: the script could not be written or the
    /// interpreter could not be spawned.
    Failed {
        run_id: u64,
        reason: String,
    },
}

impl RunStatus {
    pub fn run_id(&self) -> Option<u64> {
        match self {
            RunStatus::Idle => None,
            RunStatus::Running { run_id, .. }
            | RunStatus::Finished { run_id, .. }
            | RunStatus::Interrupted { run_id }
            | RunStatus::Failed { run_id, .. } => Some(*run_id),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running { .. })
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RunStatus::Finished { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Short label for the status line.
    pub fn label(&self) -> String {
        match self {
            RunStatus::Idle => "Idle".into(),
            RunStatus::Running { pid: Some(pid), .. } => format!("Running (pid {pid})"),
            RunStatus::Running { pid: None, .. } => "Running".into(),
            RunStatus::Finished { exit_code, .. } => format!("Finished ({exit_code})"),
            RunStatus::Interrupted { .. } => "Interrupted".into(),
            RunStatus::Failed { reason, .. } => format!("Failed: {reason}"),
        }
    }
}

/// Latest full contents of the two capture files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSnapshot {
    pub stdout: String,
    pub stderr: String,
    /// Number of poll ticks published so far.
    pub tick: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// Every status transition, in order. The watch channel only keeps the latest.
    StatusChanged(RunStatus),
    Info(InfoEvent),
}

/// Structured info events emitted by the controller and consumed by UI/CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum InfoEvent {
    Launched { run_id: u64, command: String },
    Stopping { run_id: u64 },
    Superseding { run_id: u64, next_run_id: u64 },
    StillStopping { run_id: u64 },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Launched { run_id, command } => format!("Run #{run_id}: {command}"),
            InfoEvent::Stopping { run_id } => format!("Stopping run #{run_id}…"),
            InfoEvent::Superseding {
                run_id,
                next_run_id,
            } => format!("Stopping run #{run_id} to start run #{next_run_id}…"),
            InfoEvent::StillStopping { run_id } => format!("Still stopping run #{run_id}…"),
        }
    }
}

/// Summary of one finished run, printed by headless mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: u64,
    pub command: String,
    pub status: RunStatus,
    pub started_at_utc: String,
    pub finished_at_utc: String,
    pub duration_ms: u64,
    pub stdout: String,
    pub stderr: String,
}
