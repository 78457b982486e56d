//! Application-level orchestration.
//!
//! This module owns the run lifecycle (start/supersede/stop), the output
//! poller, and post-run processing for headless mode. UI/CLI layers hold a
//! [`Session`] and only ever send commands and read published state.

mod controller;
mod outcome;
mod poller;

pub(crate) use controller::UiCommand;
pub(crate) use outcome::{build_outcome, process_exit_code};

use crate::model::{OutputSnapshot, RunConfig, RunEvent, RunStatus};
use anyhow::{Context, Result};
use poller::OutputPoller;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Running controller and poller tasks plus the handles observers use.
///
/// Write ownership: the controller alone writes `status`, the poller alone
/// writes `output`.
pub(crate) struct Session {
    pub cmd_tx: UnboundedSender<UiCommand>,
    pub status_rx: watch::Receiver<RunStatus>,
    pub output_rx: watch::Receiver<OutputSnapshot>,
    controller: JoinHandle<Result<()>>,
    poller: JoinHandle<()>,
    poller_cancel: CancellationToken,
    poller_reader: OutputPoller,
}

impl Session {
    /// Spawn the controller and poller. Must be called inside a Tokio runtime.
    pub(crate) fn start(cfg: &RunConfig) -> (Self, UnboundedReceiver<RunEvent>) {
        // Unbounded channels keep the controller from ever waiting on a slow UI.
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<RunEvent>();
        let (status_tx, status_rx) = watch::channel(RunStatus::Idle);
        let (output_tx, output_rx) = watch::channel(OutputSnapshot::default());

        let controller = tokio::spawn(controller::run_controller(
            cfg.clone(),
            status_tx,
            event_tx,
            cmd_rx,
        ));

        let poller_cancel = CancellationToken::new();
        let poller = OutputPoller::new(cfg).spawn(output_tx, poller_cancel.clone());

        tracing::info!(
            command = %cfg.command_line(),
            stdout = %cfg.stdout_path.display(),
            stderr = %cfg.stderr_path.display(),
            poll_ms = cfg.poll_interval.as_millis() as u64,
            "session started"
        );

        (
            Self {
                cmd_tx,
                status_rx,
                output_rx,
                controller,
                poller,
                poller_cancel,
                poller_reader: OutputPoller::new(cfg),
            },
            event_rx,
        )
    }

    /// Read both capture files right now, bypassing the poll period.
    pub(crate) async fn read_output_now(&self) -> OutputSnapshot {
        let previous = self.output_rx.borrow().clone();
        self.poller_reader.read_snapshot(&previous).await
    }

    /// Wait until run `run_id` reaches a quiescent status and return it.
    pub(crate) async fn wait_settled(&mut self, run_id: u64) -> Result<RunStatus> {
        let status = self
            .status_rx
            .wait_for(|s| s.run_id() == Some(run_id) && !s.is_running())
            .await
            .context("run controller stopped")?;
        Ok(status.clone())
    }

    /// Stop any running process, wait for it to be reaped, and stop polling.
    pub(crate) async fn shutdown(self) -> Result<()> {
        let _ = self.cmd_tx.send(UiCommand::Quit);
        let res = self
            .controller
            .await
            .context("run controller task failed")?;
        self.poller_cancel.cancel();
        let poller_res = self.poller.await;
        tracing::info!("session stopped");
        res?;
        poller_res.context("output poller task failed")
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::model::RunRequest;
    use crate::testutil::{pid_alive, sh_config};
    use std::time::Duration;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(10);

    /// Collect status transitions until `done` matches one.
    async fn statuses_until(
        events: &mut UnboundedReceiver<RunEvent>,
        done: impl Fn(&RunStatus) -> bool,
    ) -> Vec<RunStatus> {
        timeout(WAIT, async {
            let mut seen = Vec::new();
            while let Some(ev) = events.recv().await {
                if let RunEvent::StatusChanged(status) = ev {
                    let stop = done(&status);
                    seen.push(status);
                    if stop {
                        break;
                    }
                }
            }
            seen
        })
        .await
        .expect("status transitions within timeout")
    }

    #[tokio::test]
    async fn test_run_to_natural_exit_shows_output() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, mut events) = Session::start(&sh_config(dir.path()));

        session
            .cmd_tx
            .send(UiCommand::Run(RunRequest::new(1, "echo 1\n")))
            .unwrap();
        let status = timeout(WAIT, session.wait_settled(1)).await.unwrap().unwrap();
        assert_eq!(
            status,
            RunStatus::Finished {
                run_id: 1,
                exit_code: 0
            }
        );

        let seen = statuses_until(&mut events, |s| !s.is_running()).await;
        assert!(matches!(seen[0], RunStatus::Running { run_id: 1, .. }));
        assert_eq!(seen.len(), 2);

        // The poller catches up within a few intervals.
        let mut output_rx = session.output_rx.clone();
        timeout(WAIT, output_rx.wait_for(|o| o.stdout == "1\n"))
            .await
            .unwrap()
            .unwrap();

        // Finished stays put until the next start.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.status_rx.borrow().exit_code(), Some(0));

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_before_output_interrupts_without_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, _events) = Session::start(&sh_config(dir.path()));

        session
            .cmd_tx
            .send(UiCommand::Run(RunRequest::new(1, "sleep 30\necho late\n")))
            .unwrap();
        session.cmd_tx.send(UiCommand::Stop).unwrap();

        let status = timeout(WAIT, session.wait_settled(1)).await.unwrap().unwrap();
        assert_eq!(status, RunStatus::Interrupted { run_id: 1 });
        assert_eq!(status.exit_code(), None);

        let output = session.read_output_now().await;
        assert!(output.stdout.is_empty());

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_when_idle_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let (session, mut events) = Session::start(&sh_config(dir.path()));

        session.cmd_tx.send(UiCommand::Stop).unwrap();
        session.cmd_tx.send(UiCommand::Stop).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(*session.status_rx.borrow(), RunStatus::Idle);
        assert!(events.try_recv().is_err());
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_supersede_kills_previous_before_starting_next() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, mut events) = Session::start(&sh_config(dir.path()));

        session
            .cmd_tx
            .send(UiCommand::Run(RunRequest::new(1, "echo A\nsleep 30\n")))
            .unwrap();
        let seen = statuses_until(&mut events, |s| s.is_running()).await;
        let first_pid = match seen.last() {
            Some(RunStatus::Running { pid: Some(pid), .. }) => *pid,
            other => panic!("expected running with pid, got {other:?}"),
        };

        session
            .cmd_tx
            .send(UiCommand::Run(RunRequest::new(2, "echo B\nsleep 30\n")))
            .unwrap();
        let seen = statuses_until(&mut events, |s| s.is_running()).await;
        assert_eq!(seen[0], RunStatus::Interrupted { run_id: 1 });
        let second_pid = match &seen[1] {
            RunStatus::Running {
                run_id: 2,
                pid: Some(pid),
            } => *pid,
            other => panic!("expected run 2 running, got {other:?}"),
        };

        // Run 1 was reaped before run 2 was spawned.
        assert!(!pid_alive(first_pid));
        assert!(pid_alive(second_pid));

        let mut output_rx = session.output_rx.clone();
        timeout(WAIT, output_rx.wait_for(|o| o.stdout == "B\n"))
            .await
            .unwrap()
            .unwrap();

        session.cmd_tx.send(UiCommand::Stop).unwrap();
        let status = timeout(WAIT, session.wait_settled(2)).await.unwrap().unwrap();
        assert_eq!(status, RunStatus::Interrupted { run_id: 2 });
        assert!(!pid_alive(second_pid));

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_rapid_restarts_run_only_latest_request() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, mut events) = Session::start(&sh_config(dir.path()));

        for run_id in 1..=4 {
            session
                .cmd_tx
                .send(UiCommand::Run(RunRequest::new(
                    run_id,
                    format!("echo {run_id}\nsleep 30\n"),
                )))
                .unwrap();
        }

        let seen = statuses_until(&mut events, |s| {
            matches!(s, RunStatus::Running { run_id: 4, .. })
        })
        .await;
        // Never two Running in a row: each start follows the previous run's end.
        for pair in seen.windows(2) {
            assert!(!(pair[0].is_running() && pair[1].is_running()));
        }
        assert!(!seen
            .iter()
            .any(|s| matches!(s, RunStatus::Running { run_id: 2 | 3, .. })));

        session.cmd_tx.send(UiCommand::Stop).unwrap();
        timeout(WAIT, session.wait_settled(4)).await.unwrap().unwrap();
        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_interpreter_fails_without_running() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = sh_config(dir.path());
        cfg.interpreter = "definitely-not-an-interpreter-xyz".into();
        let (mut session, mut events) = Session::start(&cfg);

        session
            .cmd_tx
            .send(UiCommand::Run(RunRequest::new(1, "echo 1\n")))
            .unwrap();
        let status = timeout(WAIT, session.wait_settled(1)).await.unwrap().unwrap();
        assert!(matches!(status, RunStatus::Failed { run_id: 1, .. }));
        assert_eq!(status.exit_code(), None);

        let seen = statuses_until(&mut events, |s| !s.is_running()).await;
        assert_eq!(seen.len(), 1, "Running must never be published: {seen:?}");

        session.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_reaps_running_process() {
        let dir = tempfile::tempdir().unwrap();
        let (session, mut events) = Session::start(&sh_config(dir.path()));

        session
            .cmd_tx
            .send(UiCommand::Run(RunRequest::new(1, "sleep 30\n")))
            .unwrap();
        let seen = statuses_until(&mut events, |s| s.is_running()).await;
        let pid = match seen.last() {
            Some(RunStatus::Running { pid: Some(pid), .. }) => *pid,
            other => panic!("expected running with pid, got {other:?}"),
        };

        timeout(WAIT, session.shutdown()).await.unwrap().unwrap();
        assert!(!pid_alive(pid));
    }
}
