use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

fn key_line(keys: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{keys:<14}"), Style::default().fg(Color::Magenta)),
        Span::raw(action),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        key_line("F5 / Ctrl-R", "Run (stops the current run first)"),
        key_line("F6 / Ctrl-T", "Stop"),
        key_line("Shift-Tab", "Switch pane focus"),
        key_line("↑/↓ PgUp/PgDn", "Scroll the focused output pane"),
        key_line("←/→", "Scroll long output lines sideways"),
        key_line("Ctrl-Y", "Copy output to clipboard"),
        key_line("F1", "Show/hide this help"),
        key_line("Esc / Ctrl-Q", "Quit"),
        Line::from(""),
        Line::from("Editor:"),
        key_line("Tab", "Insert four spaces"),
        key_line("Home / End", "Start / end of line"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(Clear, area);
    f.render_widget(p, area);
}
