use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(key: &'static str, pad: usize, what: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::raw("  "),
        Span::styled(key, Style::default().fg(Color::Magenta)),
        Span::raw(" ".repeat(pad)),
        Span::raw(what),
    ])
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("q", Style::default().fg(Color::Magenta)),
            Span::raw(" / "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Magenta)),
            Span::raw("  Quit"),
        ]),
        key_line("tab", 9, "Switch tabs"),
        key_line("←/→ h/l", 5, "Move between panes"),
        key_line("↑/↓ j/k", 5, "Navigate"),
        key_line("R", 11, "Reload job list (bypass cache)"),
        key_line("?", 11, "Show this help"),
        Line::from(""),
        Line::from("Trigger tab:"),
        key_line("enter", 7, "Load job / pick style / edit value / toggle task"),
        key_line("n", 11, "Edit key of the selected row (map styles)"),
        key_line("a", 11, "Add row"),
        key_line("d", 11, "Delete row"),
        key_line("space", 7, "Toggle task in subset"),
        key_line("g", 11, "Trigger job"),
        key_line("esc", 9, "Cancel edit"),
        Line::from(""),
        Line::from("Runs tab:"),
        key_line("enter", 7, "Show run history of the job"),
        key_line("m", 11, "Load more runs"),
        key_line("r", 11, "Refresh history"),
        key_line("y", 11, "Copy run page URL to clipboard"),
        key_line("e", 11, "Export loaded runs as JSON"),
        Line::from(""),
        Line::from("The 'triggered_by' parameter must hold the email address of whoever starts the run."),
        Line::from("List styles take it as --triggered_by=<email>."),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
