//! Text rendering for CLI output.
//!
//! Formats job listings, parameter styles and run history tables as plain lines.
//! The run table layout is shared with the TUI history view.

use crate::model::{Job, ParameterShape, ParameterStyle};
use crate::status::RunRow;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn run_table_header() -> String {
    format!(
        "{:<19}  {:>12}  {:<13}  {:>8}  {:<14}  {:<24}  {}",
        "Start time", "Run ID", "Launched", "Duration", "Status", "Error code", "Run parameters"
    )
}

pub(crate) fn run_table_line(row: &RunRow) -> String {
    format!(
        "{:<19}  {:>12}  {:<13}  {:>8}  {:<14}  {:<24}  {}",
        row.start_time,
        row.run_id,
        row.launched,
        row.duration,
        row.status,
        row.error_code,
        row.parameters
    )
}

pub(crate) fn build_jobs_summary(jobs: &[Job]) -> TextSummary {
    if jobs.is_empty() {
        return TextSummary {
            lines: vec!["No jobs found.".into()],
        };
    }
    let lines = jobs
        .iter()
        .map(|job| {
            let kinds: Vec<&str> = job.tasks.iter().map(|t| t.kind.label()).collect();
            if kinds.is_empty() {
                job.label()
            } else {
                format!("{}  [{}]", job.label(), kinds.join(", "))
            }
        })
        .collect();
    TextSummary { lines }
}

pub(crate) fn build_styles_summary(job: &Job, styles: &[ParameterStyle]) -> TextSummary {
    let mut lines = vec![format!("Parameter styles for {}:", job.label())];
    for style in styles {
        let shape = match style.shape() {
            ParameterShape::Map => "map   --param key=value",
            ParameterShape::List => "list  --arg token",
        };
        lines.push(format!("  {:<20} {}", style.as_str(), shape));
    }
    let keys = job.task_keys();
    if !keys.is_empty() {
        lines.push(format!("Task keys: {}", keys.join(", ")));
    }
    TextSummary { lines }
}

pub(crate) fn build_runs_summary(job: &Job, rows: &[RunRow], likely_complete: bool) -> TextSummary {
    if rows.is_empty() {
        return TextSummary {
            lines: vec![format!("No runs found for {}.", job.label())],
        };
    }
    let mut lines = vec![format!("Run history of {}", job.label()), run_table_header()];
    lines.extend(rows.iter().map(run_table_line));
    if !likely_complete {
        lines.push("(more runs available, use --pages to load more)".into());
    }
    TextSummary { lines }
}
