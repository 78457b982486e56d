mod kill;
mod spawn;

use crate::error::RunError;
use crate::model::{RunConfig, RunRequest};
use crate::store::ScriptStore;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;

/// How a launched process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Exited on its own. Signal deaths on Unix are reported as `128 + signal`.
    Exited(i32),
    /// Terminated because the run was cancelled.
    Interrupted,
}

/// Writes scripts and launches the configured interpreter on them.
pub struct ScriptEngine {
    cfg: RunConfig,
    store: ScriptStore,
}

impl ScriptEngine {
    pub fn new(cfg: RunConfig) -> Self {
        let store = ScriptStore::new(cfg.script_path.clone());
        Self { cfg, store }
    }

    pub fn config(&self) -> &RunConfig {
        &self.cfg
    }

    /// Persist the request's source and spawn the interpreter on it.
    ///
    /// The caller must have reaped any previous process first; this never
    /// looks at earlier runs.
    pub async fn launch(&self, req: &RunRequest) -> Result<ScriptProcess, RunError> {
        self.store.persist(&req.source).await?;
        let child = spawn::spawn_interpreter(&self.cfg)?;
        let pid = child.id();
        tracing::info!(
            run_id = req.run_id,
            pid = ?pid,
            command = %self.cfg.command_line(),
            "process launched"
        );
        Ok(ScriptProcess {
            run_id: req.run_id,
            pid,
            child,
            kill_grace: self.cfg.kill_grace,
        })
    }
}

/// The live OS process of one run.
#[derive(Debug)]
pub struct ScriptProcess {
    run_id: u64,
    pid: Option<u32>,
    child: Child,
    kill_grace: Duration,
}

impl ScriptProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the process to exit, or terminate it once `cancel` fires.
    ///
    /// Returns only after the child has been reaped, so no live handle
    /// outlives this future.
    pub async fn wait_or_cancel(mut self, cancel: CancellationToken) -> Result<ProcessExit, RunError> {
        let run_id = self.run_id;
        let wait_err = |source| RunError::Wait { run_id, source };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // Lost the race: the process already finished on its own.
                if let Some(status) = self.child.try_wait().map_err(wait_err)? {
                    let code = exit_code(status);
                    tracing::info!(run_id, exit_code = code, "process exited before stop");
                    return Ok(ProcessExit::Exited(code));
                }
                let status = kill::terminate(&mut self.child, self.kill_grace)
                    .await
                    .map_err(wait_err)?;
                tracing::info!(run_id, pid = ?self.pid, ?status, "process interrupted");
                Ok(ProcessExit::Interrupted)
            }
            status = self.child.wait() => {
                let code = exit_code(status.map_err(wait_err)?);
                tracing::info!(run_id, exit_code = code, "process exited");
                Ok(ProcessExit::Exited(code))
            }
        }
    }
}

impl Drop for ScriptProcess {
    fn drop(&mut self) {
        // `id()` is None once reaped; only a live group is signalled.
        if let Some(pid) = self.child.id() {
            tracing::warn!(run_id = self.run_id, pid, "process dropped before reaping, killing its group");
            kill::kill_group(pid);
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}
