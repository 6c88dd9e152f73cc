use crate::error::ValidationError;
use crate::history::{BatchOutcome, RunBatch, RunHistoryCursor};
use crate::model::{Job, ParameterShape, ParameterStyle, SubmissionPayload};
use crate::params::{self, ParameterInput};
use crate::status::RunRow;
use ratatui::{
    style::Color,
    style::Style,
    text::{Line, Span},
};
use time::UtcOffset;

pub const TAB_TRIGGER: usize = 0;
pub const TAB_RUNS: usize = 1;
pub const TAB_HELP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerFocus {
    Jobs,
    Style,
    Editor,
    Tasks,
}

impl TriggerFocus {
    pub fn next(self) -> Self {
        match self {
            TriggerFocus::Jobs => TriggerFocus::Style,
            TriggerFocus::Style => TriggerFocus::Editor,
            TriggerFocus::Editor => TriggerFocus::Tasks,
            TriggerFocus::Tasks => TriggerFocus::Tasks,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            TriggerFocus::Jobs => TriggerFocus::Jobs,
            TriggerFocus::Style => TriggerFocus::Jobs,
            TriggerFocus::Editor => TriggerFocus::Style,
            TriggerFocus::Tasks => TriggerFocus::Editor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunsFocus {
    Jobs,
    Runs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditTarget {
    Key,
    Value,
}

/// In-progress text edit of one editor cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub target: EditTarget,
    pub buffer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorRow {
    pub key: String,
    pub value: String,
}

/// Parameter rows for the chosen style. List styles only use `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorState {
    pub style: ParameterStyle,
    pub rows: Vec<EditorRow>,
    pub selected: usize,
}

impl EditorState {
    pub fn new(style: ParameterStyle, input: ParameterInput) -> Self {
        let mut rows: Vec<EditorRow> = match input {
            ParameterInput::Map(pairs) => pairs
                .into_iter()
                .map(|(key, value)| EditorRow { key, value })
                .collect(),
            ParameterInput::List(items) => items
                .into_iter()
                .map(|value| EditorRow {
                    key: String::new(),
                    value,
                })
                .collect(),
        };
        if rows.is_empty() {
            rows.push(EditorRow::default());
        }
        Self {
            style,
            rows,
            selected: 0,
        }
    }

    pub fn is_map(&self) -> bool {
        self.style.shape() == ParameterShape::Map
    }

    pub fn input(&self) -> ParameterInput {
        if self.is_map() {
            ParameterInput::Map(
                self.rows
                    .iter()
                    .map(|r| (r.key.clone(), r.value.clone()))
                    .collect(),
            )
        } else {
            ParameterInput::List(self.rows.iter().map(|r| r.value.clone()).collect())
        }
    }

    pub fn add_row(&mut self) {
        self.rows.push(EditorRow::default());
        self.selected = self.rows.len() - 1;
    }

    pub fn delete_row(&mut self) {
        if self.selected < self.rows.len() {
            self.rows.remove(self.selected);
        }
        if self.rows.is_empty() {
            self.rows.push(EditorRow::default());
        }
        self.selected = self.selected.min(self.rows.len() - 1);
    }
}

pub struct UiState {
    pub tab: usize,
    pub info: String,
    pub host: String,
    pub page_size: u32,
    pub offset: UtcOffset,

    pub jobs: Vec<Job>,
    pub jobs_loading: bool,

    // Trigger tab
    pub trigger_focus: TriggerFocus,
    pub trigger_job_selected: usize,
    pub job: Option<Job>,
    pub job_loading: bool,
    pub styles: Vec<ParameterStyle>,
    pub style_selected: usize,
    pub editor: Option<EditorState>,
    pub editing: Option<TextEdit>,
    pub task_selected: usize,
    pub task_checked: Vec<bool>,
    pub submitting: bool,
    pub last_run_id: Option<i64>,

    // Runs tab
    pub runs_focus: RunsFocus,
    pub runs_job_selected: usize,
    pub cursor: RunHistoryCursor,
    pub rows: Vec<RunRow>,
    pub run_selected: usize,
    pub runs_loading: bool,
    /// History restart requested while a batch was in flight.
    pub runs_reload_queued: bool,
    pub last_exported_path: Option<String>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: TAB_TRIGGER,
            info: String::new(),
            host: String::new(),
            page_size: 5,
            offset: UtcOffset::UTC,
            jobs: Vec::new(),
            jobs_loading: false,
            trigger_focus: TriggerFocus::Jobs,
            trigger_job_selected: 0,
            job: None,
            job_loading: false,
            styles: Vec::new(),
            style_selected: 0,
            editor: None,
            editing: None,
            task_selected: 0,
            task_checked: Vec::new(),
            submitting: false,
            last_run_id: None,
            runs_focus: RunsFocus::Jobs,
            runs_job_selected: 0,
            cursor: RunHistoryCursor::default(),
            rows: Vec::new(),
            run_selected: 0,
            runs_loading: false,
            runs_reload_queued: false,
            last_exported_path: None,
        }
    }
}

impl UiState {
    pub fn set_jobs(&mut self, jobs: Vec<Job>) {
        self.jobs = jobs;
        self.jobs_loading = false;
        let last = self.jobs.len().saturating_sub(1);
        self.trigger_job_selected = self.trigger_job_selected.min(last);
        self.runs_job_selected = self.runs_job_selected.min(last);
    }

    pub fn highlighted_trigger_job(&self) -> Option<&Job> {
        self.jobs.get(self.trigger_job_selected)
    }

    pub fn highlighted_runs_job(&self) -> Option<&Job> {
        self.jobs.get(self.runs_job_selected)
    }

    /// Install freshly loaded job details on the trigger tab.
    pub fn set_job_details(&mut self, job: Job) {
        self.job_loading = false;
        self.styles = params::style_choices(&job);
        self.style_selected = 0;
        self.task_checked = vec![false; job.tasks.len()];
        self.task_selected = 0;
        self.editing = None;
        self.job = Some(job);
        self.apply_style();
    }

    pub fn selected_style(&self) -> Option<ParameterStyle> {
        self.styles.get(self.style_selected).copied()
    }

    /// Reset the editor to the prefill of the selected style.
    pub fn apply_style(&mut self) {
        self.editor = match (self.job.as_ref(), self.selected_style()) {
            (Some(job), Some(style)) => {
                Some(EditorState::new(style, params::initial_input(job, style)))
            }
            _ => None,
        };
    }

    pub fn begin_edit(&mut self, target: EditTarget) {
        let Some(editor) = self.editor.as_ref() else {
            return;
        };
        let Some(row) = editor.rows.get(editor.selected) else {
            return;
        };
        if target == EditTarget::Key && !editor.is_map() {
            return;
        }
        let buffer = match target {
            EditTarget::Key => row.key.clone(),
            EditTarget::Value => row.value.clone(),
        };
        self.editing = Some(TextEdit { target, buffer });
    }

    pub fn commit_edit(&mut self) {
        let (Some(edit), Some(editor)) = (self.editing.take(), self.editor.as_mut()) else {
            return;
        };
        if let Some(row) = editor.rows.get_mut(editor.selected) {
            match edit.target {
                EditTarget::Key => row.key = edit.buffer,
                EditTarget::Value => row.value = edit.buffer,
            }
        }
    }

    /// Flip the highlighted task; tasks without a key cannot be targeted.
    pub fn toggle_task(&mut self) {
        let keyed = self
            .job
            .as_ref()
            .and_then(|j| j.tasks.get(self.task_selected))
            .is_some_and(|t| !t.task_key.is_empty());
        if !keyed {
            return;
        }
        if let Some(checked) = self.task_checked.get_mut(self.task_selected) {
            *checked = !*checked;
        }
    }

    /// Checked task keys in job order, or `None` to run the whole job.
    pub fn task_subset(&self) -> Option<Vec<String>> {
        let job = self.job.as_ref()?;
        let keys: Vec<String> = job
            .tasks
            .iter()
            .zip(&self.task_checked)
            .filter(|(t, checked)| **checked && !t.task_key.is_empty())
            .map(|(t, _)| t.task_key.clone())
            .collect();
        (!keys.is_empty()).then_some(keys)
    }

    /// Validate the form into a run-now payload.
    pub fn build_submission(&self) -> Result<SubmissionPayload, String> {
        let (Some(job), Some(editor)) = (self.job.as_ref(), self.editor.as_ref()) else {
            return Err("Select a job first (Enter on the job list)".into());
        };
        params::build_payload(job, editor.style, editor.input(), self.task_subset()).map_err(
            |e| match e {
                ValidationError::MissingTriggeredBy | ValidationError::InvalidEmailShape { .. } => {
                    format!("✗ {e}")
                }
                other => other.to_string(),
            },
        )
    }

    /// Point the runs tab at `job_id`; returns whether history was reset.
    pub fn select_runs_job(&mut self, job_id: i64) -> bool {
        let changed = self.cursor.select_job(job_id);
        if changed {
            self.rows.clear();
            self.run_selected = 0;
        }
        changed
    }

    pub fn reset_runs(&mut self) {
        self.cursor.reset();
        self.rows.clear();
        self.run_selected = 0;
    }

    /// Fold a run batch into the history and describe what happened.
    pub fn apply_runs_batch(
        &mut self,
        job_id: i64,
        limit: u32,
        offset: u32,
        batch: RunBatch,
    ) -> Option<String> {
        self.runs_loading = false;
        match self.cursor.apply_batch(job_id, offset, limit, batch) {
            BatchOutcome::Appended(0) => Some("No more runs to load.".into()),
            BatchOutcome::Appended(n) => {
                let start = self.rows.len();
                self.rows.extend(
                    self.cursor.runs()[start..]
                        .iter()
                        .map(|r| RunRow::from_run(r, self.offset)),
                );
                Some(format!("Loaded {n} run(s), {} total", self.rows.len()))
            }
            BatchOutcome::Failed(err) => Some(err.to_string()),
            BatchOutcome::Stale => None,
        }
    }

    pub fn selected_run(&self) -> Option<&RunRow> {
        self.rows.get(self.run_selected)
    }
}

/// Push `label: value`, wrapping the value to the area width.
pub fn push_wrapped_kv(out: &mut Vec<Line<'static>>, label: &str, value: &str, area_width: u16) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    // Account for borders (2 chars on each side)
    let usable_width = area_width.saturating_sub(4).max(1);
    let label_text = format!("{label}:");
    let label_width = label_text.chars().count() as u16;

    let value_chars: Vec<char> = value.chars().collect();
    let mut remaining = value_chars.as_slice();
    let mut first = true;

    while !remaining.is_empty() {
        let line_width = if first {
            usable_width.saturating_sub(label_width + 1).max(1)
        } else {
            usable_width.saturating_sub(2).max(1)
        };

        let chars_to_take = (remaining.len() as u16).min(line_width) as usize;
        let (line_chars, rest) = remaining.split_at(chars_to_take);
        let line_text: String = line_chars.iter().collect();

        if first {
            out.push(Line::from(vec![
                Span::styled(label_text.clone(), Style::default().fg(Color::Gray)),
                Span::raw(" "),
                Span::raw(line_text),
            ]));
            first = false;
        } else {
            out.push(Line::from(vec![Span::raw("  "), Span::raw(line_text)]));
        }

        remaining = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ParameterEncoding, RunRecord, Task, TaskKind};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;

    fn job() -> Job {
        Job {
            job_id: 11,
            name: Some("daily".into()),
            tasks: vec![
                Task {
                    task_key: "load".into(),
                    kind: TaskKind::Notebook {
                        notebook_path: None,
                    },
                },
                Task {
                    task_key: "score".into(),
                    kind: TaskKind::PythonScript { python_file: None },
                },
            ],
            parameters: IndexMap::from([("env".to_string(), "prod".to_string())]),
        }
    }

    #[test]
    fn job_details_prefill_the_editor() {
        let mut state = UiState::default();
        state.set_job_details(job());
        assert_eq!(
            state.styles,
            vec![
                ParameterStyle::JobParameters,
                ParameterStyle::NotebookParams,
                ParameterStyle::PythonNamedParams,
                ParameterStyle::PythonParams,
            ]
        );
        let editor = state.editor.as_ref().unwrap();
        assert_eq!(
            editor.rows,
            vec![
                EditorRow {
                    key: "env".into(),
                    value: "prod".into()
                },
                EditorRow {
                    key: "triggered_by".into(),
                    value: String::new()
                },
            ]
        );
        assert_eq!(
            state.build_submission().unwrap_err(),
            "✗ the 'triggered_by' parameter is required and must contain an email address"
        );
    }

    #[test]
    fn edited_form_builds_payload_with_task_subset() {
        let mut state = UiState::default();
        state.set_job_details(job());
        state.style_selected = 3;
        state.apply_style();

        state.begin_edit(EditTarget::Value);
        if let Some(edit) = state.editing.as_mut() {
            edit.buffer.push_str("ops@corp.io");
        }
        state.commit_edit();
        state.editor.as_mut().unwrap().add_row();
        state.begin_edit(EditTarget::Key);
        assert!(state.editing.is_none(), "list styles have no keys");
        state.begin_edit(EditTarget::Value);
        state.editing.as_mut().unwrap().buffer = "--date=2024-06-01".into();
        state.commit_edit();

        state.task_selected = 1;
        state.toggle_task();

        let payload = state.build_submission().unwrap();
        assert_eq!(
            payload.parameters,
            ParameterEncoding::PythonParams(vec![
                "--triggered_by=ops@corp.io".into(),
                "--date=2024-06-01".into()
            ])
        );
        assert_eq!(payload.tasks, Some(vec!["score".to_string()]));
    }

    #[test]
    fn keyless_tasks_stay_out_of_the_subset() {
        let mut job = job();
        job.tasks.push(Task {
            task_key: String::new(),
            kind: TaskKind::Unknown,
        });
        let mut state = UiState::default();
        state.set_job_details(job);

        state.task_selected = 2;
        state.toggle_task();
        assert_eq!(state.task_checked, vec![false, false, false]);
        assert_eq!(state.task_subset(), None);

        // A stale check on a keyless task is ignored too.
        state.task_checked = vec![true, false, true];
        assert_eq!(state.task_subset(), Some(vec!["load".to_string()]));
    }

    #[test]
    fn delete_keeps_one_row() {
        let mut editor = EditorState::new(
            ParameterStyle::SqlParams,
            ParameterInput::Map(vec![("a".into(), "1".into())]),
        );
        editor.delete_row();
        assert_eq!(editor.rows, vec![EditorRow::default()]);
        assert_eq!(editor.selected, 0);
    }

    #[test]
    fn runs_batches_render_rows_and_reset_on_job_change() {
        let mut state = UiState::default();
        assert!(state.select_runs_job(11));
        let batch = RunBatch {
            runs: vec![
                RunRecord {
                    run_id: 2,
                    ..Default::default()
                },
                RunRecord {
                    run_id: 1,
                    ..Default::default()
                },
            ],
            error: None,
        };
        let msg = state.apply_runs_batch(11, 5, 0, batch).unwrap();
        assert_eq!(msg, "Loaded 2 run(s), 2 total");
        assert_eq!(state.rows.iter().map(|r| r.run_id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(state.rows[0].status, "Unknown");

        let empty = RunBatch {
            runs: vec![],
            error: None,
        };
        assert_eq!(
            state.apply_runs_batch(11, 5, 5, empty).as_deref(),
            Some("No more runs to load.")
        );

        assert!(state.select_runs_job(12));
        assert!(state.rows.is_empty());
    }

    #[test]
    fn wrapped_kv_splits_long_values() {
        let mut lines = Vec::new();
        push_wrapped_kv(&mut lines, "Params", &"x".repeat(30), 20);
        assert!(lines.len() > 1);
        push_wrapped_kv(&mut lines, "Empty", "  ", 20);
        assert!(lines.len() > 1);
    }
}
