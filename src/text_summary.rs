//! Text summary builder for headless output.
//!
//! Formats the human-readable trailer printed to stderr after a run.

use crate::model::{RunOutcome, RunStatus};
use std::time::Duration;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from a finished run.
pub(crate) fn build_text_summary(outcome: &RunOutcome) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("== Run #{}: {} ==", outcome.run_id, outcome.command));
    lines.push(format!("Status: {}", outcome.status.label()));
    match &outcome.status {
        RunStatus::Finished { exit_code, .. } => {
            lines.push(format!("Last return code is {exit_code}"));
        }
        RunStatus::Interrupted { .. } => lines.push("Stopped before completion".into()),
        _ => {}
    }
    // Round to milliseconds so the line stays short.
    let elapsed = Duration::from_millis(outcome.duration_ms);
    lines.push(format!(
        "Duration: {}",
        humantime::format_duration(elapsed)
    ));
    lines.push(format!("Started: {}", outcome.started_at_utc));

    TextSummary { lines }
}
