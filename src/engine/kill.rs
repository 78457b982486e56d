use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::process::Child;

/// Interrupt, then kill, then reap.
///
/// On Unix the whole process group gets SIGTERM, `grace` to exit, and then
/// SIGKILL. A zero grace skips straight to SIGKILL.
#[cfg(unix)]
pub(super) async fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped.
        return child.wait().await;
    };
    let group = Pid::from_raw(pid as i32);

    if !grace.is_zero() {
        if let Err(errno) = killpg(group, Signal::SIGTERM) {
            tracing::debug!(pid, %errno, "SIGTERM to process group failed");
        }
        if let Ok(status) = tokio::time::timeout(grace, child.wait()).await {
            // Leader is gone; take down anything it left behind in the group.
            let _ = killpg(group, Signal::SIGKILL);
            return status;
        }
        tracing::debug!(pid, grace_ms = grace.as_millis() as u64, "grace period elapsed");
    }

    if let Err(errno) = killpg(group, Signal::SIGKILL) {
        tracing::debug!(pid, %errno, "SIGKILL to process group failed, killing leader");
        child.start_kill()?;
    }
    child.wait().await
}

#[cfg(not(unix))]
pub(super) async fn terminate(child: &mut Child, _grace: Duration) -> io::Result<ExitStatus> {
    // No process groups to signal; kill the child directly.
    if let Err(e) = child.start_kill() {
        tracing::debug!(error = %e, "start_kill failed");
    }
    child.wait().await
}

/// SIGKILL the whole group without reaping. Used when a live process handle is dropped.
#[cfg(unix)]
pub(super) fn kill_group(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(errno) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        tracing::debug!(pid, %errno, "SIGKILL to dropped process group failed");
    }
}

// `kill_on_drop` already covers the lone child.
#[cfg(not(unix))]
pub(super) fn kill_group(_pid: u32) {}
