use crate::error::RunError;
use crate::model::RunConfig;
use std::fs::File;
use std::path::Path;
use std::process::Stdio;
use tokio::process::{Child, Command};

/// Open a capture file, truncating whatever the previous run wrote.
fn open_capture(path: &Path) -> Result<File, RunError> {
    let to_err = |source| RunError::OutputFile {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(to_err)?;
        }
    }
    File::create(path).map_err(to_err)
}

/// Spawn `interpreter [args…] <script>` with stdin closed and both output
/// streams redirected into the capture files.
pub(super) fn spawn_interpreter(cfg: &RunConfig) -> Result<Child, RunError> {
    let stdout = open_capture(&cfg.stdout_path)?;
    let stderr = open_capture(&cfg.stderr_path)?;

    let mut cmd = std::process::Command::new(&cfg.interpreter);
    cmd.args(&cfg.interpreter_args)
        .arg(&cfg.script_path)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    if let Some(dir) = cfg.work_dir.as_deref() {
        cmd.current_dir(dir);
    }
    // Own process group so a stop also reaches anything the interpreter forks.
    // `kill_on_drop` below only hits the leader; `ScriptProcess`'s drop takes
    // down the rest of the group.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut cmd = Command::from(cmd);
    cmd.kill_on_drop(true);
    cmd.spawn().map_err(|source| RunError::Spawn {
        program: cfg.interpreter.clone(),
        source,
    })
}
