//! Run lifecycle controller.
//!
//! Owns the single live script process: start, supersede and stop are all
//! serialized here, and this task is the only writer of [`RunStatus`].

use crate::engine::{ProcessExit, ScriptEngine};
use crate::error::RunError;
use crate::model::{InfoEvent, RunConfig, RunEvent, RunRequest, RunStatus};
use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

/// Commands emitted by UI layers to control script runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UiCommand {
    /// Start a run, stopping the current one first.
    Run(RunRequest),
    Stop,
    Quit,
}

/// Internal handle for the running process.
struct RunCtx {
    run_id: u64,
    cancel: CancellationToken,
    handle: Option<tokio::task::JoinHandle<Result<ProcessExit, RunError>>>,
}

/// Single-writer side of the published run status.
struct StatusPublisher {
    status_tx: watch::Sender<RunStatus>,
    event_tx: UnboundedSender<RunEvent>,
}

impl StatusPublisher {
    fn publish(&self, status: RunStatus) {
        tracing::debug!(?status, "status changed");
        self.status_tx.send_replace(status.clone());
        let _ = self.event_tx.send(RunEvent::StatusChanged(status));
    }

    fn info(&self, info: InfoEvent) {
        let _ = self.event_tx.send(RunEvent::Info(info));
    }
}

/// Launch a run and hand its process to a worker task.
///
/// A launch failure publishes `Failed` and leaves nothing running.
async fn start_run(engine: &ScriptEngine, req: RunRequest, out: &StatusPublisher) -> Option<RunCtx> {
    let run_id = req.run_id;
    match engine.launch(&req).await {
        Ok(process) => {
            let cancel = CancellationToken::new();
            out.publish(RunStatus::Running {
                run_id,
                pid: process.pid(),
            });
            out.info(InfoEvent::Launched {
                run_id,
                command: engine.config().command_line(),
            });
            let worker_cancel = cancel.clone();
            let handle = tokio::spawn(async move { process.wait_or_cancel(worker_cancel).await });
            Some(RunCtx {
                run_id,
                cancel,
                handle: Some(handle),
            })
        }
        Err(e) => {
            tracing::error!(run_id, error = %e.reason(), "launch failed");
            out.publish(RunStatus::Failed {
                run_id,
                reason: e.reason(),
            });
            None
        }
    }
}

/// Map a reaped run to its final status.
///
/// `Running` was already published, so a lost wait or a crashed worker ends
/// the run as `Interrupted`; `Failed` is reserved for runs that never started.
fn finished_status(run_id: u64, res: Result<Result<ProcessExit, RunError>, tokio::task::JoinError>) -> RunStatus {
    match res {
        Ok(Ok(ProcessExit::Exited(exit_code))) => RunStatus::Finished { run_id, exit_code },
        Ok(Ok(ProcessExit::Interrupted)) => RunStatus::Interrupted { run_id },
        Ok(Err(e)) => {
            tracing::error!(run_id, error = %e.reason(), "run failed while waiting");
            RunStatus::Interrupted { run_id }
        }
        Err(e) => {
            tracing::error!(run_id, error = %e, "run worker join failed");
            RunStatus::Interrupted { run_id }
        }
    }
}

/// Orchestrate script runs based on UI commands and publish status back to
/// presentation layers.
pub(crate) async fn run_controller(
    cfg: RunConfig,
    status_tx: watch::Sender<RunStatus>,
    event_tx: UnboundedSender<RunEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let engine = ScriptEngine::new(cfg);
    let out = StatusPublisher {
        status_tx,
        event_tx,
    };

    let mut run_ctx: Option<RunCtx> = None;
    // Latest Run request waiting for the current process to be reaped.
    let mut pending: Option<RunRequest> = None;
    let mut quit_pending = false;
    // Stop watchdog: if a kill takes too long, emit a status message to keep UI feedback alive.
    let mut stop_deadline: Option<tokio::time::Instant> = None;
    let mut watchdog = tokio::time::interval(Duration::from_millis(500));

    let res = loop {
        tokio::select! {
            // Once quitting, commands are no longer read; a closed channel would spin otherwise.
            cmd = cmd_rx.recv(), if !quit_pending => {
                match cmd {
                    Some(UiCommand::Run(req)) => {
                        // Supersede is serialized: cancel the active run first, then start the
                        // new one once we observe its process was reaped. Never two live processes.
                        if let Some(ctx) = &run_ctx {
                            tracing::info!(run_id = ctx.run_id, next_run_id = req.run_id, "superseding run");
                            out.info(InfoEvent::Superseding { run_id: ctx.run_id, next_run_id: req.run_id });
                            ctx.cancel.cancel();
                            pending = Some(req);
                            stop_deadline.get_or_insert(tokio::time::Instant::now() + Duration::from_secs(3));
                        } else {
                            run_ctx = start_run(&engine, req, &out).await;
                        }
                    }
                    Some(UiCommand::Stop) => {
                        pending = None;
                        if let Some(ctx) = &run_ctx {
                            if !ctx.cancel.is_cancelled() {
                                tracing::info!(run_id = ctx.run_id, "stopping run");
                                out.info(InfoEvent::Stopping { run_id: ctx.run_id });
                                ctx.cancel.cancel();
                                stop_deadline = Some(tokio::time::Instant::now() + Duration::from_secs(3));
                            }
                        }
                    }
                    Some(UiCommand::Quit) | None => {
                        // Quit waits for the current process to be reaped so nothing outlives us.
                        quit_pending = true;
                        pending = None;
                        if let Some(ctx) = &run_ctx {
                            ctx.cancel.cancel();
                        } else {
                            break Ok(());
                        }
                    }
                }
            }
            // Do not take the JoinHandle before this branch wins; otherwise it can be dropped
            // if another select branch is chosen, and we'll never observe completion.
            maybe_done = async {
                if let Some(ctx) = &mut run_ctx {
                    if let Some(h) = ctx.handle.as_mut() {
                        return Some(h.await);
                    }
                }
                futures::future::pending().await
            } => {
                if let Some(join_res) = maybe_done {
                    if let Some(ctx) = run_ctx.take() {
                        out.publish(finished_status(ctx.run_id, join_res));
                    }
                    stop_deadline = None;
                    if quit_pending {
                        break Ok(());
                    }
                    if let Some(req) = pending.take() {
                        run_ctx = start_run(&engine, req, &out).await;
                    }
                }
            }
            // If a kill stalls (e.g. uninterruptible I/O), keep the user informed.
            _ = watchdog.tick() => {
                if let Some(deadline) = stop_deadline {
                    if tokio::time::Instant::now() >= deadline {
                        if let Some(ctx) = &run_ctx {
                            tracing::warn!(run_id = ctx.run_id, "process still not reaped after stop");
                            out.info(InfoEvent::StillStopping { run_id: ctx.run_id });
                        }
                        stop_deadline = None;
                    }
                }
            }
        }
    };

    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_wait_failure_after_running_is_interrupted() {
        let err = RunError::Wait {
            run_id: 3,
            source: io::Error::new(io::ErrorKind::Other, "wait lost"),
        };
        assert_eq!(
            finished_status(3, Ok(Err(err))),
            RunStatus::Interrupted { run_id: 3 }
        );
    }

    #[test]
    fn test_exit_and_cancel_map_to_final_status() {
        assert_eq!(
            finished_status(1, Ok(Ok(ProcessExit::Exited(2)))),
            RunStatus::Finished {
                run_id: 1,
                exit_code: 2
            }
        );
        assert_eq!(
            finished_status(1, Ok(Ok(ProcessExit::Interrupted))),
            RunStatus::Interrupted { run_id: 1 }
        );
    }

    #[tokio::test]
    async fn test_panicked_worker_is_interrupted() {
        let crash = true;
        let handle = tokio::spawn(async move {
            if crash {
                panic!("worker crashed");
            }
            Ok::<_, RunError>(ProcessExit::Exited(0))
        });
        assert_eq!(
            finished_status(4, handle.await),
            RunStatus::Interrupted { run_id: 4 }
        );
    }
}
