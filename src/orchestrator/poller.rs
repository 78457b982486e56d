//! Output poller.
//!
//! Re-reads both capture files on a fixed period and republishes their full
//! contents, changed or not. Partial reads while the script is still writing
//! are fine: the next tick replaces them.

use crate::model::{OutputSnapshot, RunConfig};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Floor for the poll period; `tokio::time::interval` rejects zero.
pub(crate) const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub(crate) struct OutputPoller {
    stdout_path: PathBuf,
    stderr_path: PathBuf,
    interval: Duration,
}

impl OutputPoller {
    pub(crate) fn new(cfg: &RunConfig) -> Self {
        Self {
            stdout_path: cfg.stdout_path.clone(),
            stderr_path: cfg.stderr_path.clone(),
            interval: cfg.poll_interval.max(MIN_POLL_INTERVAL),
        }
    }

    /// Read both files once, keeping `previous` content for a stream whose read failed.
    pub(crate) async fn read_snapshot(&self, previous: &OutputSnapshot) -> OutputSnapshot {
        let (stdout, stderr) = tokio::join!(
            read_capture(&self.stdout_path, &previous.stdout),
            read_capture(&self.stderr_path, &previous.stderr),
        );
        OutputSnapshot {
            stdout,
            stderr,
            tick: previous.tick + 1,
        }
    }

    /// Poll until `cancel` fires. The first tick happens immediately.
    pub(crate) async fn run(self, tx: watch::Sender<OutputSnapshot>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let previous = tx.borrow().clone();
                    let snapshot = self.read_snapshot(&previous).await;
                    // Republish even if unchanged; observers never miss a tick boundary.
                    tx.send_replace(snapshot);
                }
                _ = cancel.cancelled() => {
                    tracing::debug!("output poller cancelled");
                    break;
                }
            }
        }
    }

    pub(crate) fn spawn(
        self,
        tx: watch::Sender<OutputSnapshot>,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run(tx, cancel))
    }
}

/// A missing file reads as empty; any other failure keeps what was shown before.
async fn read_capture(path: &Path, previous: &str) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "capture read failed");
            previous.to_string()
        }
    }
}
