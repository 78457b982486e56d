use super::editor::TextBuffer;
use crate::model::{OutputSnapshot, RunEvent, RunStatus};

/// Which pane receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Editor,
    Output,
    Errors,
}

impl Focus {
    pub fn next(self) -> Self {
        match self {
            Focus::Editor => Focus::Output,
            Focus::Output => Focus::Errors,
            Focus::Errors => Focus::Editor,
        }
    }
}

pub struct UiState {
    pub editor: TextBuffer,
    pub focus: Focus,
    pub show_help: bool,
    pub info: String,
    pub command_line: String,

    // Mirrors of the published session state, refreshed every frame.
    pub status: RunStatus,
    pub output: OutputSnapshot,
    pub last_exit_code: Option<i32>,

    pub output_scroll: u16,
    pub errors_scroll: u16,
    // Column offsets; capture lines are never wrapped.
    pub output_hscroll: u16,
    pub errors_hscroll: u16,
    pub next_run_id: u64,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            editor: TextBuffer::default(),
            focus: Focus::Editor,
            show_help: false,
            info: String::new(),
            command_line: String::new(),
            status: RunStatus::Idle,
            output: OutputSnapshot::default(),
            last_exit_code: None,
            output_scroll: 0,
            errors_scroll: 0,
            output_hscroll: 0,
            errors_hscroll: 0,
            next_run_id: 1,
        }
    }
}

impl UiState {
    /// Allocate the id for the next RUN press.
    pub fn take_run_id(&mut self) -> u64 {
        let id = self.next_run_id;
        self.next_run_id += 1;
        id
    }

    pub fn apply_event(&mut self, ev: RunEvent) {
        match ev {
            RunEvent::StatusChanged(status) => self.apply_status(status),
            RunEvent::Info(info) => self.info = info.to_message(),
        }
    }

    pub fn apply_status(&mut self, status: RunStatus) {
        if let Some(code) = status.exit_code() {
            self.last_exit_code = Some(code);
        }
        if let RunStatus::Failed { reason, .. } = &status {
            self.info = reason.clone();
        }
        self.status = status;
    }

    /// Replace the shown output wholesale; keep scroll offsets inside the new text.
    pub fn apply_output(&mut self, output: OutputSnapshot) {
        self.output_scroll = clamp_scroll(self.output_scroll, &output.stdout);
        self.errors_scroll = clamp_scroll(self.errors_scroll, &output.stderr);
        self.output_hscroll = clamp_hscroll(self.output_hscroll, &output.stdout);
        self.errors_hscroll = clamp_hscroll(self.errors_hscroll, &output.stderr);
        self.output = output;
    }

    pub fn scroll_focused(&mut self, delta: i32) {
        let (offset, text) = match self.focus {
            Focus::Output => (&mut self.output_scroll, &self.output.stdout),
            Focus::Errors => (&mut self.errors_scroll, &self.output.stderr),
            Focus::Editor => return,
        };
        let moved = (*offset as i32 + delta).clamp(0, u16::MAX as i32) as u16;
        *offset = clamp_scroll(moved, text);
    }

    pub fn hscroll_focused(&mut self, delta: i32) {
        let (offset, text) = match self.focus {
            Focus::Output => (&mut self.output_hscroll, &self.output.stdout),
            Focus::Errors => (&mut self.errors_hscroll, &self.output.stderr),
            Focus::Editor => return,
        };
        let moved = (*offset as i32 + delta).clamp(0, u16::MAX as i32) as u16;
        *offset = clamp_hscroll(moved, text);
    }
}

fn clamp_scroll(offset: u16, text: &str) -> u16 {
    let max = text.lines().count().saturating_sub(1);
    offset.min(max.min(u16::MAX as usize) as u16)
}

/// Keep at least the last char of the widest line in view.
fn clamp_hscroll(offset: u16, text: &str) -> u16 {
    let widest = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    offset.min(widest.saturating_sub(1).min(u16::MAX as usize) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InfoEvent;

    #[test]
    fn test_last_exit_code_survives_later_runs() {
        let mut state = UiState::default();
        state.apply_event(RunEvent::StatusChanged(RunStatus::Running {
            run_id: 1,
            pid: Some(42),
        }));
        state.apply_event(RunEvent::StatusChanged(RunStatus::Finished {
            run_id: 1,
            exit_code: 3,
        }));
        state.apply_event(RunEvent::StatusChanged(RunStatus::Running {
            run_id: 2,
            pid: Some(43),
        }));
        state.apply_event(RunEvent::StatusChanged(RunStatus::Interrupted { run_id: 2 }));

        assert_eq!(state.last_exit_code, Some(3));
        assert_eq!(state.status, RunStatus::Interrupted { run_id: 2 });
    }

    #[test]
    fn test_info_and_failure_update_message() {
        let mut state = UiState::default();
        state.apply_event(RunEvent::Info(InfoEvent::Stopping { run_id: 5 }));
        assert_eq!(state.info, "Stopping run #5…");

        state.apply_status(RunStatus::Failed {
            run_id: 6,
            reason: "failed to launch `kotlinc`: not found".into(),
        });
        assert_eq!(state.info, "failed to launch `kotlinc`: not found");
    }

    #[test]
    fn test_scroll_clamped_to_text() {
        let mut state = UiState {
            focus: Focus::Output,
            ..Default::default()
        };
        state.apply_output(OutputSnapshot {
            stdout: "a\nb\nc\n".into(),
            ..Default::default()
        });
        state.scroll_focused(10);
        assert_eq!(state.output_scroll, 2);
        state.scroll_focused(-5);
        assert_eq!(state.output_scroll, 0);

        state.scroll_focused(2);
        // A new, shorter run output pulls the offset back.
        state.apply_output(OutputSnapshot {
            stdout: "only\n".into(),
            ..Default::default()
        });
        assert_eq!(state.output_scroll, 0);
    }

    #[test]
    fn test_run_ids_increase() {
        let mut state = UiState::default();
        assert_eq!(state.take_run_id(), 1);
        assert_eq!(state.take_run_id(), 2);
    }

    #[test]
    fn test_horizontal_scroll_clamped_to_widest_line() {
        let mut state = UiState {
            focus: Focus::Errors,
            ..Default::default()
        };
        state.apply_output(OutputSnapshot {
            stderr: "short\nexception at a.very.long.Frame(Script.kts:12)\n".into(),
            ..Default::default()
        });
        state.hscroll_focused(30);
        assert_eq!(state.errors_hscroll, 30);
        state.hscroll_focused(500);
        assert_eq!(state.errors_hscroll, 44);
        assert_eq!(state.output_hscroll, 0);

        state.apply_output(OutputSnapshot {
            stderr: "tiny\n".into(),
            ..Default::default()
        });
        assert_eq!(state.errors_hscroll, 3);
    }
}
