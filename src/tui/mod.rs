mod export;
mod help;
mod state;

use crate::model::AppConfig;
use crate::orchestrator::{self, AppEvent, Session, UiCommand};
use crate::text_summary::{run_table_header, run_table_line};
use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Terminal,
};
use state::{
    push_wrapped_kv, EditTarget, RunsFocus, TriggerFocus, UiState, TAB_HELP, TAB_RUNS,
    TAB_TRIGGER,
};
use std::{io, time::Duration, time::Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

pub async fn run(cfg: AppConfig, session: Session) -> Result<()> {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<AppEvent>();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();

    // TUI runs in a dedicated thread to keep all blocking I/O out of the Tokio runtime.
    let ui_handle = std::thread::spawn(move || run_threaded(cfg, event_rx, cmd_tx));

    let res = orchestrator::run_controller(session, event_tx, cmd_rx).await;

    let join_res = tokio::task::spawn_blocking(move || ui_handle.join()).await;
    if let Ok(joined) = join_res {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(anyhow::anyhow!("TUI thread panicked")),
        }
    }

    res
}

/// Run the TUI loop on a dedicated thread.
fn run_threaded(
    cfg: AppConfig,
    mut event_rx: UnboundedReceiver<AppEvent>,
    cmd_tx: UnboundedSender<UiCommand>,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).ok();

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;
    terminal.clear().ok();

    // UiState is owned by the UI thread only; no cross-thread mutation.
    let mut state = UiState {
        host: cfg.host.clone(),
        page_size: cfg.page_size,
        offset: cfg.utc_offset,
        jobs_loading: true,
        info: "Loading jobs…".into(),
        ..Default::default()
    };
    let _ = cmd_tx.send(UiCommand::LoadJobs { refresh: false });

    let tick_rate = Duration::from_millis(100);
    let mut last_tick = Instant::now() - tick_rate;

    let res = loop {
        while let Ok(ev) = event_rx.try_recv() {
            apply_event(&mut state, ev, &cmd_tx);
        }

        if last_tick.elapsed() >= tick_rate {
            terminal.draw(|f| draw(f.area(), f, &state)).ok();
            last_tick = Instant::now();
        }

        // Poll input with a short timeout to avoid blocking the render loop.
        if event::poll(Duration::from_millis(10)).unwrap_or(false) {
            if let Ok(Event::Key(k)) = event::read() {
                if k.kind != KeyEventKind::Press {
                    continue;
                }
                if handle_key(&mut state, k, &cmd_tx) {
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

fn request_runs(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    let Some(job_id) = state.cursor.job_id() else {
        state.info = "Select a job first (Enter on the job list)".into();
        return;
    };
    if state.runs_loading {
        return;
    }
    state.runs_loading = true;
    let _ = cmd_tx.send(UiCommand::LoadRuns {
        job_id,
        limit: state.page_size,
        offset: state.cursor.offset(),
    });
}

/// Restart history from the first page, after any batch still in flight.
fn reload_runs(state: &mut UiState, cmd_tx: &UnboundedSender<UiCommand>) {
    if state.runs_loading {
        state.runs_reload_queued = true;
        return;
    }
    state.reset_runs();
    request_runs(state, cmd_tx);
}

fn apply_event(state: &mut UiState, ev: AppEvent, cmd_tx: &UnboundedSender<UiCommand>) {
    match ev {
        AppEvent::JobsLoaded(jobs) => {
            state.info = if jobs.is_empty() {
                "No jobs found.".into()
            } else {
                format!("Loaded {} job(s)", jobs.len())
            };
            state.set_jobs(jobs);
        }
        AppEvent::JobLoaded(job) => {
            state.info = format!("Selected {}", job.label());
            state.set_job_details(job);
            state.trigger_focus = TriggerFocus::Style;
        }
        AppEvent::RunsLoaded {
            job_id,
            limit,
            offset,
            batch,
        } => {
            if let Some(msg) = state.apply_runs_batch(job_id, limit, offset, batch) {
                state.info = msg;
            }
            if std::mem::take(&mut state.runs_reload_queued) {
                state.reset_runs();
                request_runs(state, cmd_tx);
            }
        }
        AppEvent::Submitted { job_id, run_id } => {
            state.submitting = false;
            state.last_run_id = Some(run_id);
            state.info = format!("Workflow triggered successfully ✅ run_id {run_id}");
            if state.cursor.job_id() == Some(job_id) {
                reload_runs(state, cmd_tx);
            }
        }
        AppEvent::SubmissionFailed(msg) => {
            state.submitting = false;
            state.info = msg;
        }
        AppEvent::Info(msg) => {
            state.jobs_loading = false;
            state.job_loading = false;
            state.info = msg;
        }
    }
}

fn step(selected: &mut usize, len: usize, down: bool) {
    if down {
        if *selected + 1 < len {
            *selected += 1;
        }
    } else {
        *selected = selected.saturating_sub(1);
    }
}

/// Handle a key press; returns true when the app should quit.
fn handle_key(state: &mut UiState, k: KeyEvent, cmd_tx: &UnboundedSender<UiCommand>) -> bool {
    if let Some(edit) = state.editing.as_mut() {
        match k.code {
            KeyCode::Enter => state.commit_edit(),
            KeyCode::Esc => state.editing = None,
            KeyCode::Backspace => {
                edit.buffer.pop();
            }
            KeyCode::Char(c) => edit.buffer.push(c),
            _ => {}
        }
        return false;
    }

    match (k.modifiers, k.code) {
        (_, KeyCode::Char('q')) | (KeyModifiers::CONTROL, KeyCode::Char('c')) => return true,
        (_, KeyCode::Tab) => state.tab = (state.tab + 1) % 3,
        (_, KeyCode::Char('?')) => state.tab = TAB_HELP,
        (_, KeyCode::Char('R')) => {
            state.jobs_loading = true;
            state.info = "Reloading jobs…".into();
            let _ = cmd_tx.send(UiCommand::LoadJobs { refresh: true });
        }
        _ => match state.tab {
            TAB_TRIGGER => handle_trigger_key(state, k, cmd_tx),
            TAB_RUNS => handle_runs_key(state, k, cmd_tx),
            _ => {}
        },
    }
    false
}

fn handle_trigger_key(state: &mut UiState, k: KeyEvent, cmd_tx: &UnboundedSender<UiCommand>) {
    match k.code {
        KeyCode::Left | KeyCode::Char('h') => state.trigger_focus = state.trigger_focus.prev(),
        KeyCode::Right | KeyCode::Char('l') => state.trigger_focus = state.trigger_focus.next(),
        KeyCode::Up | KeyCode::Char('k') | KeyCode::Down | KeyCode::Char('j') => {
            let down = matches!(k.code, KeyCode::Down | KeyCode::Char('j'));
            match state.trigger_focus {
                TriggerFocus::Jobs => step(&mut state.trigger_job_selected, state.jobs.len(), down),
                TriggerFocus::Style => step(&mut state.style_selected, state.styles.len(), down),
                TriggerFocus::Editor => {
                    if let Some(editor) = state.editor.as_mut() {
                        step(&mut editor.selected, editor.rows.len(), down);
                    }
                }
                TriggerFocus::Tasks => step(&mut state.task_selected, state.task_checked.len(), down),
            }
        }
        KeyCode::Enter => match state.trigger_focus {
            TriggerFocus::Jobs => {
                if let Some(job_id) = state.highlighted_trigger_job().map(|j| j.job_id) {
                    state.job_loading = true;
                    state.info = "Loading job…".into();
                    let _ = cmd_tx.send(UiCommand::LoadJob { job_id });
                }
            }
            TriggerFocus::Style => {
                state.apply_style();
                state.trigger_focus = TriggerFocus::Editor;
            }
            TriggerFocus::Editor => state.begin_edit(EditTarget::Value),
            TriggerFocus::Tasks => state.toggle_task(),
        },
        KeyCode::Char(' ') if state.trigger_focus == TriggerFocus::Tasks => state.toggle_task(),
        KeyCode::Char('n') if state.trigger_focus == TriggerFocus::Editor => {
            state.begin_edit(EditTarget::Key)
        }
        KeyCode::Char('a') if state.trigger_focus == TriggerFocus::Editor => {
            if let Some(editor) = state.editor.as_mut() {
                editor.add_row();
            }
        }
        KeyCode::Char('d') if state.trigger_focus == TriggerFocus::Editor => {
            if let Some(editor) = state.editor.as_mut() {
                editor.delete_row();
            }
        }
        KeyCode::Char('g') => {
            if state.submitting {
                return;
            }
            match state.build_submission() {
                Ok(payload) => {
                    state.submitting = true;
                    state.info = format!("Triggering job {}…", payload.job_id);
                    let _ = cmd_tx.send(UiCommand::Submit(payload));
                }
                Err(msg) => state.info = msg,
            }
        }
        _ => {}
    }
}

fn handle_runs_key(state: &mut UiState, k: KeyEvent, cmd_tx: &UnboundedSender<UiCommand>) {
    match k.code {
        KeyCode::Left | KeyCode::Char('h') => state.runs_focus = RunsFocus::Jobs,
        KeyCode::Right | KeyCode::Char('l') => state.runs_focus = RunsFocus::Runs,
        KeyCode::Up | KeyCode::Char('k') | KeyCode::Down | KeyCode::Char('j') => {
            let down = matches!(k.code, KeyCode::Down | KeyCode::Char('j'));
            match state.runs_focus {
                RunsFocus::Jobs => step(&mut state.runs_job_selected, state.jobs.len(), down),
                RunsFocus::Runs => step(&mut state.run_selected, state.rows.len(), down),
            }
        }
        KeyCode::Enter if state.runs_focus == RunsFocus::Jobs => {
            if let Some(job_id) = state.highlighted_runs_job().map(|j| j.job_id) {
                if state.select_runs_job(job_id) {
                    reload_runs(state, cmd_tx);
                } else if state.cursor.needs_initial_load() {
                    request_runs(state, cmd_tx);
                }
                state.runs_focus = RunsFocus::Runs;
            }
        }
        KeyCode::Char('m') => request_runs(state, cmd_tx),
        KeyCode::Char('r') => {
            if state.cursor.job_id().is_some() {
                reload_runs(state, cmd_tx);
            }
        }
        KeyCode::Char('y') => match state.selected_run().and_then(|r| r.url.clone()) {
            Some(url) => match export::copy_to_clipboard(&url) {
                Ok(()) => state.info = format!("✓ Copied to clipboard: {url}"),
                Err(e) => state.info = format!("Clipboard copy failed: {e:#}"),
            },
            None => state.info = "Selected run has no page URL".into(),
        },
        KeyCode::Char('e') => {
            if let Some(job_id) = state.cursor.job_id() {
                match export::export_runs_json(job_id, &state.rows) {
                    Ok(p) => {
                        state.last_exported_path = Some(p.to_string_lossy().to_string());
                        state.info = format!("Exported JSON: {}", p.display());
                    }
                    Err(e) => state.info = format!("JSON export failed: {e:#}"),
                }
            }
        }
        _ => {}
    }
}

fn draw(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
        .split(area);

    let tabs = Tabs::new(vec![Line::from("Trigger"), Line::from("Runs"), Line::from("Help")])
        .select(state.tab)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("databricks-jobs-cli | {}", state.host)),
        )
        .highlight_style(Style::default().fg(Color::Yellow));
    f.render_widget(tabs, chunks[0]);

    match state.tab {
        TAB_TRIGGER => draw_trigger(chunks[1], f, state),
        TAB_RUNS => draw_runs(chunks[1], f, state),
        _ => help::draw_help(chunks[1], f),
    }

    let status = Paragraph::new(Line::from(vec![
        Span::styled("Info: ", Style::default().fg(Color::Gray)),
        Span::raw(state.info.clone()),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(status, chunks[2]);
}

fn pane(title: &str, focused: bool) -> Block<'static> {
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

/// First index to show so that `selected` stays within `height` rows.
fn scroll_start(selected: usize, height: usize) -> usize {
    if height == 0 {
        0
    } else {
        selected.saturating_sub(height - 1)
    }
}

fn list_lines(items: &[String], selected: usize, focused: bool, height: usize) -> Vec<Line<'static>> {
    let start = scroll_start(selected, height);
    items
        .iter()
        .enumerate()
        .skip(start)
        .take(height.max(1))
        .map(|(i, text)| {
            if i == selected {
                let style = if focused {
                    Style::default().add_modifier(Modifier::REVERSED)
                } else {
                    Style::default().fg(Color::Yellow)
                };
                Line::from(Span::styled(format!("> {text}"), style))
            } else {
                Line::from(format!("  {text}"))
            }
        })
        .collect()
}

fn job_labels(state: &UiState) -> Vec<String> {
    state.jobs.iter().map(|j| j.label()).collect()
}

fn draw_job_list(area: Rect, f: &mut ratatui::Frame, state: &UiState, selected: usize, focused: bool) {
    let lines = if state.jobs_loading {
        vec![Line::from("Loading…")]
    } else if state.jobs.is_empty() {
        vec![Line::from("No jobs found.")]
    } else {
        list_lines(
            &job_labels(state),
            selected,
            focused,
            area.height.saturating_sub(2) as usize,
        )
    };
    f.render_widget(Paragraph::new(lines).block(pane("Jobs", focused)), area);
}

fn draw_trigger(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)].as_ref())
        .split(area);

    draw_job_list(
        cols[0],
        f,
        state,
        state.trigger_job_selected,
        state.trigger_focus == TriggerFocus::Jobs,
    );

    let Some(job) = state.job.as_ref() else {
        let msg = if state.job_loading {
            "Loading job…"
        } else {
            "Press Enter on a job to compose a run."
        };
        f.render_widget(Paragraph::new(msg).block(pane("Run a job", false)), cols[1]);
        return;
    };

    let task_rows = (job.tasks.len() as u16).clamp(1, 8) + 2;
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(state.styles.len() as u16 + 2),
                Constraint::Min(4),
                Constraint::Length(task_rows),
            ]
            .as_ref(),
        )
        .split(cols[1]);

    let style_names: Vec<String> = state
        .styles
        .iter()
        .map(|s| {
            let active = state.editor.as_ref().map(|e| e.style) == Some(*s);
            format!("{}{}", s.as_str(), if active { "  (editing)" } else { "" })
        })
        .collect();
    let focused = state.trigger_focus == TriggerFocus::Style;
    f.render_widget(
        Paragraph::new(list_lines(&style_names, state.style_selected, focused, style_names.len()))
            .block(pane(&format!("Parameter style for {}", job.label()), focused)),
        right[0],
    );

    draw_editor(right[1], f, state);

    let task_items: Vec<String> = job
        .tasks
        .iter()
        .zip(&state.task_checked)
        .map(|(t, checked)| {
            format!(
                "[{}] {} ({})",
                match (t.task_key.is_empty(), *checked) {
                    (true, _) => "-",
                    (false, true) => "x",
                    (false, false) => " ",
                },
                t.task_key,
                t.kind.label()
            )
        })
        .collect();
    let focused = state.trigger_focus == TriggerFocus::Tasks;
    f.render_widget(
        Paragraph::new(list_lines(
            &task_items,
            state.task_selected,
            focused,
            right[2].height.saturating_sub(2) as usize,
        ))
        .block(pane("Run only selected task keys (optional)", focused)),
        right[2],
    );
}

fn draw_editor(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let focused = state.trigger_focus == TriggerFocus::Editor;
    let Some(editor) = state.editor.as_ref() else {
        f.render_widget(Paragraph::new("").block(pane("Parameters", focused)), area);
        return;
    };

    let shape = if editor.is_map() { "map" } else { "list" };
    let mut lines = Vec::new();
    let height = area.height.saturating_sub(3) as usize;
    let start = scroll_start(editor.selected, height);
    for (i, row) in editor.rows.iter().enumerate().skip(start).take(height.max(1)) {
        let selected = i == editor.selected;
        let editing = state.editing.as_ref().filter(|_| selected);
        let cell = |text: &str, target: EditTarget| -> Span<'static> {
            match editing {
                Some(e) if e.target == target => Span::styled(
                    format!("{}▏", e.buffer),
                    Style::default().fg(Color::Black).bg(Color::Cyan),
                ),
                _ if text.is_empty() => Span::styled(
                    if target == EditTarget::Key { "<key>" } else { "<value>" },
                    Style::default().fg(Color::DarkGray),
                ),
                _ => Span::raw(text.to_string()),
            }
        };
        let marker = if selected && focused { "> " } else { "  " };
        let mut spans = vec![Span::styled(marker, Style::default().fg(Color::Yellow))];
        if editor.is_map() {
            spans.push(cell(&row.key, EditTarget::Key));
            spans.push(Span::styled(" = ", Style::default().fg(Color::Gray)));
        }
        spans.push(cell(&row.value, EditTarget::Value));
        lines.push(Line::from(spans));
    }
    lines.push(Line::from(Span::styled(
        "enter: edit value  n: edit key  a: add  d: delete  g: trigger",
        Style::default().fg(Color::DarkGray),
    )));

    f.render_widget(
        Paragraph::new(lines).block(pane(&format!("{} ({shape})", editor.style), focused)),
        area,
    );
}

fn status_color(status: &str) -> Color {
    match status {
        "SUCCESS" => Color::Green,
        "FAILED" | "TIMEOUT" | "INTERNAL_ERROR" => Color::Red,
        "CANCELED" | "SKIPPED" => Color::Yellow,
        "RUNNING" | "PENDING" | "QUEUED" | "TERMINATING" => Color::Cyan,
        _ => Color::Gray,
    }
}

fn draw_runs(area: Rect, f: &mut ratatui::Frame, state: &UiState) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(25), Constraint::Percentage(75)].as_ref())
        .split(area);

    draw_job_list(
        cols[0],
        f,
        state,
        state.runs_job_selected,
        state.runs_focus == RunsFocus::Jobs,
    );

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(7)].as_ref())
        .split(cols[1]);

    let focused = state.runs_focus == RunsFocus::Runs;
    let title = match state.cursor.job_id() {
        Some(id) => {
            let name = state
                .jobs
                .iter()
                .find(|j| j.job_id == id)
                .map(|j| j.label())
                .unwrap_or_else(|| id.to_string());
            format!("Run history of {name}")
        }
        None => "Run history".to_string(),
    };

    let mut lines = vec![Line::from(Span::styled(
        run_table_header(),
        Style::default().fg(Color::Gray),
    ))];
    if state.cursor.job_id().is_none() {
        lines.push(Line::from("Press Enter on a job to view its run history."));
    } else if state.rows.is_empty() {
        lines.push(Line::from(if state.runs_loading {
            "Loading…"
        } else {
            "No runs found for this job."
        }));
    } else {
        let height = right[0].height.saturating_sub(4) as usize;
        let start = scroll_start(state.run_selected, height);
        for (i, row) in state.rows.iter().enumerate().skip(start).take(height.max(1)) {
            let mut style = Style::default().fg(status_color(&row.status));
            if i == state.run_selected && focused {
                style = style.add_modifier(Modifier::REVERSED);
            }
            lines.push(Line::from(Span::styled(run_table_line(row), style)));
        }
        let more = if state.runs_loading {
            "loading…"
        } else if state.cursor.likely_complete() {
            "probably all runs loaded, m: try more"
        } else {
            "m: load more runs"
        };
        lines.push(Line::from(Span::styled(
            format!("{} run(s) loaded | {more} | r: refresh", state.rows.len()),
            Style::default().fg(Color::DarkGray),
        )));
    }
    f.render_widget(Paragraph::new(lines).block(pane(&title, focused)), right[0]);

    let mut detail = Vec::new();
    if let Some(row) = state.selected_run() {
        let width = right[1].width;
        push_wrapped_kv(&mut detail, "Run", &row.run_id.to_string(), width);
        push_wrapped_kv(&mut detail, "Status", &row.status, width);
        push_wrapped_kv(&mut detail, "Error code", &row.error_code, width);
        push_wrapped_kv(&mut detail, "Run parameters", &row.parameters, width);
        if let Some(url) = row.url.as_deref() {
            push_wrapped_kv(&mut detail, "URL", url, width);
        }
    }
    if let Some(path) = state.last_exported_path.as_deref() {
        push_wrapped_kv(&mut detail, "Last export", path, right[1].width);
    }
    f.render_widget(
        Paragraph::new(detail).block(Block::default().borders(Borders::ALL).title("Selected run")),
        right[1],
    );
}
