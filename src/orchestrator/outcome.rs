//! Post-run processing for headless mode.
//!
//! Turns the final status and capture snapshot into a [`RunOutcome`] and maps
//! it to a process exit code.

use crate::model::{OutputSnapshot, RunConfig, RunOutcome, RunStatus};
use std::time::Duration;
use time::OffsetDateTime;

/// Exit code used when the script was stopped before it finished (SIGINT convention).
pub(crate) const EXIT_INTERRUPTED: i32 = 130;

pub(crate) fn build_outcome(
    cfg: &RunConfig,
    run_id: u64,
    status: RunStatus,
    started_at: OffsetDateTime,
    elapsed: Duration,
    snapshot: OutputSnapshot,
) -> RunOutcome {
    RunOutcome {
        run_id,
        command: cfg.command_line(),
        status,
        started_at_utc: rfc3339(started_at),
        finished_at_utc: rfc3339(started_at + elapsed),
        duration_ms: elapsed.as_millis() as u64,
        stdout: snapshot.stdout,
        stderr: snapshot.stderr,
    }
}

fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "now".into())
}

/// Exit code for this binary after a headless run.
pub(crate) fn process_exit_code(status: &RunStatus) -> i32 {
    match status {
        RunStatus::Finished { exit_code, .. } => *exit_code,
        RunStatus::Interrupted { .. } => EXIT_INTERRUPTED,
        RunStatus::Idle | RunStatus::Running { .. } | RunStatus::Failed { .. } => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sh_config;
    use std::path::Path;
    use time::macros::datetime;

    #[test]
    fn test_outcome_timestamps_and_duration() {
        let cfg = sh_config(Path::new("/work"));
        let outcome = build_outcome(
            &cfg,
            7,
            RunStatus::Finished {
                run_id: 7,
                exit_code: 0,
            },
            datetime!(2026-01-02 03:04:05 UTC),
            Duration::from_millis(2000),
            OutputSnapshot {
                stdout: "1\n".into(),
                stderr: String::new(),
                tick: 12,
            },
        );

        assert_eq!(outcome.started_at_utc, "2026-01-02T03:04:05Z");
        assert_eq!(outcome.finished_at_utc, "2026-01-02T03:04:07Z");
        assert_eq!(outcome.duration_ms, 2000);
        assert_eq!(outcome.stdout, "1\n");
        assert_eq!(outcome.command, "sh /work/script.sh");
    }

    #[test]
    fn test_process_exit_codes() {
        assert_eq!(
            process_exit_code(&RunStatus::Finished {
                run_id: 1,
                exit_code: 4
            }),
            4
        );
        assert_eq!(
            process_exit_code(&RunStatus::Interrupted { run_id: 1 }),
            EXIT_INTERRUPTED
        );
        assert_eq!(
            process_exit_code(&RunStatus::Failed {
                run_id: 1,
                reason: "missing".into()
            }),
            1
        );
    }
}
