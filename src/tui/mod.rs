mod clipboard;
mod editor;
mod help;
mod state;

use crate::cli::{build_config, Cli};
use crate::model::{OutputSnapshot, RunEvent, RunRequest, RunStatus};
use crate::orchestrator::{Session, UiCommand};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use editor::TextBuffer;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Terminal,
};
use state::{Focus, UiState};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

const PAGE: i32 = 10;
const HSTEP: i32 = 4;

pub async fn run(args: Cli) -> Result<()> {
    let cfg = build_config(&args);
    let initial = match args.load.as_deref() {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("load {}", path.display()))?,
        None => String::new(),
    };

    let (session, event_rx) = Session::start(&cfg);
    let state = UiState {
        editor: TextBuffer::from_text(&initial),
        command_line: cfg.command_line(),
        ..Default::default()
    };

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    // It only reads published state and sends commands.
    let status_rx = session.status_rx.clone();
    let output_rx = session.output_rx.clone();
    let cmd_tx = session.cmd_tx.clone();
    let ui_handle = std::thread::spawn(move || {
        run_threaded(state, event_rx, status_rx, output_rx, cmd_tx)
    });

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    // Reap the script process even when the UI failed.
    let shutdown_res = session.shutdown().await;

    match join_res {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => return Err(e),
        Ok(Err(_)) => return Err(anyhow::anyhow!("TUI thread panicked")),
        Err(e) => return Err(e).context("join TUI thread"),
    }
    shutdown_res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    mut state: UiState,
    mut event_rx: UnboundedReceiver<RunEvent>,
    mut status_rx: watch::Receiver<RunStatus>,
    mut output_rx: watch::Receiver<OutputSnapshot>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    let tick_rate = Duration::from_millis(50);
    let mut last_draw: Option<Instant> = None;

    let res = loop {
        // Drain events without blocking to keep UI responsive.
        while let Ok(ev) = event_rx.try_recv() {
            state.apply_event(ev);
        }
        if status_rx.has_changed().unwrap_or(false) {
            let status = status_rx.borrow_and_update().clone();
            state.apply_status(status);
        }
        if output_rx.has_changed().unwrap_or(false) {
            let output = output_rx.borrow_and_update().clone();
            state.apply_output(output);
        }

        if last_draw.map_or(true, |t| t.elapsed() >= tick_rate) {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_draw = Some(Instant::now());
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            let Ok(Event::Key(k)) = event::read() else {
                continue;
            };
            if k.kind != KeyEventKind::Press {
                continue;
            }
            match handle_key(&mut state, k) {
                KeyAction::None => {}
                KeyAction::Command(cmd) => {
                    if cmd_tx.send(cmd).is_err() {
                        break Err(anyhow::anyhow!("run controller stopped"));
                    }
                }
                KeyAction::Copy(text) => {
                    state.info = match clipboard::copy_to_clipboard(&text) {
                        Ok(()) => format!("✓ Copied {} bytes to clipboard", text.len()),
                        Err(e) => format!("Clipboard copy failed: {e:#}"),
                    };
                }
                KeyAction::Quit => {
                    let _ = cmd_tx.send(UiCommand::Quit);
                    break Ok(());
                }
            }
        }
    };

    disable_raw_mode().ok();
    let mut stdout = io::stdout();
    execute!(stdout, LeaveAlternateScreen).ok();
    res
}

/// What a key press asks the outer loop to do.
#[derive(Debug, PartialEq)]
enum KeyAction {
    None,
    Command(UiCommand),
    Copy(String),
    Quit,
}

fn request_run(state: &mut UiState) -> KeyAction {
    let req = RunRequest::new(state.take_run_id(), state.editor.text());
    state.info = format!("Run #{} requested", req.run_id);
    KeyAction::Command(UiCommand::Run(req))
}

fn handle_key(state: &mut UiState, k: KeyEvent) -> KeyAction {
    let ctrl = k.modifiers.contains(KeyModifiers::CONTROL);

    match k.code {
        KeyCode::Esc if state.show_help => {
            state.show_help = false;
            KeyAction::None
        }
        KeyCode::Esc => KeyAction::Quit,
        KeyCode::Char('q') | KeyCode::Char('c') if ctrl => KeyAction::Quit,
        KeyCode::F(5) => request_run(state),
        KeyCode::Char('r') if ctrl => request_run(state),
        KeyCode::F(6) => KeyAction::Command(UiCommand::Stop),
        KeyCode::Char('t') if ctrl => KeyAction::Command(UiCommand::Stop),
        KeyCode::Char('y') if ctrl => {
            let text = match state.focus {
                Focus::Errors => state.output.stderr.clone(),
                _ => state.output.stdout.clone(),
            };
            KeyAction::Copy(text)
        }
        KeyCode::F(1) => {
            state.show_help = !state.show_help;
            KeyAction::None
        }
        KeyCode::BackTab => {
            state.focus = state.focus.next();
            KeyAction::None
        }
        _ if state.focus == Focus::Editor => {
            edit(&mut state.editor, k);
            KeyAction::None
        }
        _ => {
            match k.code {
                KeyCode::Up => state.scroll_focused(-1),
                KeyCode::Down => state.scroll_focused(1),
                KeyCode::PageUp => state.scroll_focused(-PAGE),
                KeyCode::PageDown => state.scroll_focused(PAGE),
                KeyCode::Left => state.hscroll_focused(-HSTEP),
                KeyCode::Right => state.hscroll_focused(HSTEP),
                KeyCode::Home => {
                    state.scroll_focused(-i32::from(u16::MAX));
                    state.hscroll_focused(-i32::from(u16::MAX));
                }
                KeyCode::End => state.scroll_focused(i32::from(u16::MAX)),
                _ => {}
            }
            KeyAction::None
        }
    }
}

fn edit(buf: &mut TextBuffer, k: KeyEvent) {
    let plain = !k
        .modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT);
    match k.code {
        KeyCode::Char(c) if plain => buf.insert_char(c),
        KeyCode::Enter => buf.insert_newline(),
        KeyCode::Tab => buf.insert_str("    "),
        KeyCode::Backspace => buf.backspace(),
        KeyCode::Delete => buf.delete(),
        KeyCode::Left => buf.move_left(),
        KeyCode::Right => buf.move_right(),
        KeyCode::Up => buf.move_up(),
        KeyCode::Down => buf.move_down(),
        KeyCode::Home => buf.move_home(),
        KeyCode::End => buf.move_end(),
        _ => {}
    }
}

fn pane_block(title: &str, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border)
        .title(title.to_string())
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)].as_ref())
        .split(chunks[0]);

    let captures = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(body[1]);

    draw_editor(body[0], f, state);
    draw_capture(
        captures[0],
        f,
        "Output",
        &state.output.stdout,
        (state.output_scroll, state.output_hscroll),
        state.focus == Focus::Output,
        Style::default(),
    );
    draw_capture(
        captures[1],
        f,
        "Errors",
        &state.output.stderr,
        (state.errors_scroll, state.errors_hscroll),
        state.focus == Focus::Errors,
        Style::default().fg(Color::Red),
    );
    draw_status(chunks[1], f, state);

    if state.show_help {
        help::draw_help(centered_rect(60, 60, area), f);
    }
}

fn draw_editor(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let focused = state.focus == Focus::Editor;
    let lines = state.editor.lines();
    let (row, col) = state.editor.cursor();

    let inner_h = area.height.saturating_sub(2).max(1) as usize;
    let gutter = lines.len().to_string().len();
    let inner_w = (area.width.saturating_sub(2) as usize)
        .saturating_sub(gutter + 1)
        .max(1);
    // Keep the cursor cell on screen.
    let top = row.saturating_sub(inner_h - 1);
    let left = col.saturating_sub(inner_w - 1);

    let text: Vec<Line> = lines
        .iter()
        .enumerate()
        .skip(top)
        .take(inner_h)
        .map(|(i, line)| {
            Line::from(vec![
                Span::styled(
                    format!("{:>gutter$} ", i + 1),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::raw(line.chars().skip(left).collect::<String>()),
            ])
        })
        .collect();

    let p = Paragraph::new(text).block(pane_block("Code", focused));
    f.render_widget(p, area);

    if focused && area.width > 2 && area.height > 2 {
        let max_x = area.x + area.width - 2;
        let x = (area.x as usize + 1 + gutter + 1 + (col - left)).min(max_x as usize) as u16;
        let y = area.y + 1 + (row - top) as u16;
        f.set_cursor_position((x, y));
    }
}

fn draw_capture(
    area: Rect,
    f: &mut ratatui::Frame,
    title: &str,
    text: &str,
    scroll: (u16, u16),
    focused: bool,
    style: Style,
) {
    let p = Paragraph::new(text.to_string())
        .style(style)
        .scroll(scroll)
        .block(pane_block(title, focused));
    f.render_widget(p, area);
}

fn status_style(status: &RunStatus) -> Style {
    match status {
        RunStatus::Idle => Style::default().fg(Color::Gray),
        RunStatus::Running { .. } => Style::default()
            .fg(Color::Green)
            .add_modifier(Modifier::BOLD),
        RunStatus::Finished { .. } => Style::default().fg(Color::Cyan),
        RunStatus::Interrupted { .. } => Style::default().fg(Color::Yellow),
        RunStatus::Failed { .. } => Style::default().fg(Color::Red),
    }
}

fn draw_status(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let mut spans = vec![Span::styled(
        state.status.label(),
        status_style(&state.status),
    )];
    if let Some(code) = state.last_exit_code {
        spans.push(Span::raw("  "));
        spans.push(Span::raw(format!("Last return code is {code}")));
    }
    if !state.info.is_empty() {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            state.info.clone(),
            Style::default().fg(Color::Gray),
        ));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .title(state.command_line.clone())
        .title_bottom(Line::from(vec![
            Span::styled("F5", Style::default().fg(Color::Magenta)),
            Span::raw(" run  "),
            Span::styled("F6", Style::default().fg(Color::Magenta)),
            Span::raw(" stop  "),
            Span::styled("F1", Style::default().fg(Color::Magenta)),
            Span::raw(" help  "),
            Span::styled("Esc", Style::default().fg(Color::Magenta)),
            Span::raw(" quit"),
        ]));
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ]
            .as_ref(),
        )
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ]
            .as_ref(),
        )
        .split(vertical[1])[1]
}
