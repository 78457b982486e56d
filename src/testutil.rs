//! Shared fixtures for process tests.

use crate::model::RunConfig;
use std::path::Path;
use std::time::Duration;

/// A config that runs scripts with `sh`, with every file inside `dir`.
pub(crate) fn sh_config(dir: &Path) -> RunConfig {
    RunConfig {
        interpreter: "sh".into(),
        interpreter_args: Vec::new(),
        script_path: dir.join("script.sh"),
        stdout_path: dir.join("output.txt"),
        stderr_path: dir.join("errors.txt"),
        work_dir: Some(dir.to_path_buf()),
        poll_interval: Duration::from_millis(20),
        kill_grace: Duration::from_millis(100),
    }
}

/// Whether a process with this pid is still running. Zombies count as gone:
/// orphans reparented to a non-reaping init linger in that state.
#[cfg(unix)]
pub(crate) fn pid_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    if kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // State is the first field after the parenthesized command name.
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}

/// Poll until `pid` is gone; false if it outlives two seconds.
#[cfg(unix)]
pub(crate) async fn wait_gone(pid: u32) -> bool {
    for _ in 0..200 {
        if !pid_alive(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

/// Wait until the file at `path` holds at least one complete line.
#[cfg(unix)]
pub(crate) async fn read_when_written(path: &Path) -> String {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(text) = tokio::fs::read_to_string(path).await {
                if text.ends_with('\n') {
                    return text;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("file written within timeout")
}
