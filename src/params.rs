//! Run-time parameter resolution.
//!
//! Maps a job's task kinds to the parameter encodings run-now accepts and builds
//! the submission payload from operator input, enforcing the `triggered_by`
//! provenance field before anything is sent.

use crate::error::ValidationError;
use crate::model::{
    Job, ParameterEncoding, ParameterShape, ParameterStyle, SubmissionPayload, TaskKind,
};
use indexmap::IndexMap;
use std::collections::BTreeSet;

pub const TRIGGERED_BY: &str = "triggered_by";
pub const TRIGGERED_BY_FLAG: &str = "--triggered_by=";

/// Raw operator input for one encoding style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterInput {
    Map(Vec<(String, String)>),
    List(Vec<String>),
}

impl ParameterInput {
    fn shape(&self) -> ParameterShape {
        match self {
            ParameterInput::Map(_) => ParameterShape::Map,
            ParameterInput::List(_) => ParameterShape::List,
        }
    }
}

fn styles_for_kind(kind: &TaskKind) -> &'static [ParameterStyle] {
    match kind {
        TaskKind::Notebook { .. } => &[ParameterStyle::NotebookParams],
        TaskKind::PythonScript { .. } => {
            &[ParameterStyle::PythonParams, ParameterStyle::PythonNamedParams]
        }
        TaskKind::JarSubmit { .. } => &[ParameterStyle::JarParams],
        TaskKind::SparkSubmit => &[ParameterStyle::SparkSubmitParams],
        TaskKind::SqlTask { .. } => &[ParameterStyle::SqlParams],
        TaskKind::PythonWheel { .. } => &[ParameterStyle::PythonNamedParams],
        TaskKind::DbtTask { .. } => &[ParameterStyle::DbtCommands],
        TaskKind::Unknown => &[],
    }
}

/// Encoding styles legal for `job`: job_parameters plus whatever its tasks accept.
pub fn legal_encoding_styles(job: &Job) -> BTreeSet<ParameterStyle> {
    let mut styles = BTreeSet::from([ParameterStyle::JobParameters]);
    for task in &job.tasks {
        styles.extend(styles_for_kind(&task.kind).iter().copied());
    }
    styles
}

/// Styles in the order they are offered: job_parameters first, then by name.
pub fn style_choices(job: &Job) -> Vec<ParameterStyle> {
    let mut rest: Vec<ParameterStyle> = legal_encoding_styles(job)
        .into_iter()
        .filter(|s| *s != ParameterStyle::JobParameters)
        .collect();
    rest.sort_by_key(|s| s.as_str());
    let mut choices = vec![ParameterStyle::JobParameters];
    choices.extend(rest);
    choices
}

/// Editor prefill for `style`: the job's defaults (job_parameters only) and an
/// empty provenance slot.
pub fn initial_input(job: &Job, style: ParameterStyle) -> ParameterInput {
    match style.shape() {
        ParameterShape::Map => {
            let mut rows: Vec<(String, String)> = if style == ParameterStyle::JobParameters {
                job.parameters
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            } else {
                Vec::new()
            };
            if !rows.iter().any(|(k, _)| k == TRIGGERED_BY) {
                rows.push((TRIGGERED_BY.to_string(), String::new()));
            }
            ParameterInput::Map(rows)
        }
        ParameterShape::List => ParameterInput::List(vec![TRIGGERED_BY_FLAG.to_string()]),
    }
}

/// Minimal email shape: one `@`, text on both sides, a `.` in the domain.
pub fn is_email_shaped(value: &str) -> bool {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && domain.contains('.')
        }
        _ => false,
    }
}

fn check_triggered_by(value: Option<&str>) -> Result<(), ValidationError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(ValidationError::MissingTriggeredBy);
    }
    if !is_email_shaped(value) {
        return Err(ValidationError::InvalidEmailShape {
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Value of the first `--triggered_by=` token, if any.
pub fn triggered_by_from_tokens(tokens: &[String]) -> Option<&str> {
    tokens
        .iter()
        .find(|t| t.starts_with(TRIGGERED_BY_FLAG))
        .and_then(|t| t.split_once('=').map(|(_, v)| v))
}

fn resolve_map(entries: Vec<(String, String)>) -> IndexMap<String, String> {
    let mut map = IndexMap::new();
    for (k, v) in entries {
        if !k.is_empty() {
            map.insert(k, v);
        }
    }
    map
}

/// Build the run-now payload for `job`.
///
/// Fails without side effects when the provenance field is missing or malformed,
/// when the input shape does not match `style`, when `style` is not legal for
/// the job, or when the task subset is empty or names unknown tasks. The subset
/// is otherwise passed through unmodified.
pub fn build_payload(
    job: &Job,
    style: ParameterStyle,
    input: ParameterInput,
    task_subset: Option<Vec<String>>,
) -> Result<SubmissionPayload, ValidationError> {
    if input.shape() != style.shape() {
        return Err(ValidationError::ShapeMismatch {
            style,
            expected: match style.shape() {
                ParameterShape::Map => "key/value",
                ParameterShape::List => "list",
            },
        });
    }

    let parameters = match input {
        ParameterInput::Map(entries) => {
            let map = resolve_map(entries);
            check_triggered_by(map.get(TRIGGERED_BY).map(String::as_str))?;
            match style {
                ParameterStyle::JobParameters => ParameterEncoding::JobParameters(map),
                ParameterStyle::NotebookParams => ParameterEncoding::NotebookParams(map),
                ParameterStyle::PythonNamedParams => ParameterEncoding::PythonNamedParams(map),
                _ => ParameterEncoding::SqlParams(map),
            }
        }
        ParameterInput::List(tokens) => {
            let tokens: Vec<String> = tokens.into_iter().filter(|t| !t.is_empty()).collect();
            check_triggered_by(triggered_by_from_tokens(&tokens))?;
            match style {
                ParameterStyle::PythonParams => ParameterEncoding::PythonParams(tokens),
                ParameterStyle::JarParams => ParameterEncoding::JarParams(tokens),
                ParameterStyle::SparkSubmitParams => ParameterEncoding::SparkSubmitParams(tokens),
                _ => ParameterEncoding::DbtCommands(tokens),
            }
        }
    };

    if !legal_encoding_styles(job).contains(&style) {
        return Err(ValidationError::UnsupportedStyle { style });
    }

    if let Some(subset) = &task_subset {
        if subset.is_empty() {
            return Err(ValidationError::EmptyTaskSubset);
        }
        let known = job.task_keys();
        if let Some(key) = subset.iter().find(|k| !known.contains(k)) {
            return Err(ValidationError::UnknownTaskKey { key: key.clone() });
        }
    }

    Ok(SubmissionPayload {
        job_id: job.job_id,
        parameters,
        tasks: task_subset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Task;
    use pretty_assertions::assert_eq;

    fn job_with(kinds: Vec<(&str, TaskKind)>) -> Job {
        Job {
            job_id: 99,
            name: Some("etl".into()),
            tasks: kinds
                .into_iter()
                .map(|(key, kind)| Task {
                    task_key: key.into(),
                    kind,
                })
                .collect(),
            parameters: IndexMap::from([("table".to_string(), "users".to_string())]),
        }
    }

    fn notebook() -> TaskKind {
        TaskKind::Notebook {
            notebook_path: None,
        }
    }

    fn python() -> TaskKind {
        TaskKind::PythonScript { python_file: None }
    }

    fn map(pairs: &[(&str, &str)]) -> ParameterInput {
        ParameterInput::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn list(tokens: &[&str]) -> ParameterInput {
        ParameterInput::List(tokens.iter().map(|t| t.to_string()).collect())
    }

    #[test]
    fn job_parameters_always_legal() {
        let empty = job_with(vec![]);
        assert_eq!(
            legal_encoding_styles(&empty),
            BTreeSet::from([ParameterStyle::JobParameters])
        );
        let other = job_with(vec![("x", TaskKind::Unknown)]);
        assert_eq!(
            legal_encoding_styles(&other),
            BTreeSet::from([ParameterStyle::JobParameters])
        );
    }

    #[test]
    fn notebook_only_job() {
        let job = job_with(vec![("nb", notebook())]);
        assert_eq!(
            legal_encoding_styles(&job),
            BTreeSet::from([ParameterStyle::JobParameters, ParameterStyle::NotebookParams])
        );
    }

    #[test]
    fn mixed_job_unions_styles_and_orders_choices() {
        let job = job_with(vec![
            ("py", python()),
            ("dbt", TaskKind::DbtTask { commands: vec![] }),
            ("sql", TaskKind::SqlTask { warehouse_id: None }),
        ]);
        assert_eq!(
            style_choices(&job),
            vec![
                ParameterStyle::JobParameters,
                ParameterStyle::DbtCommands,
                ParameterStyle::PythonNamedParams,
                ParameterStyle::PythonParams,
                ParameterStyle::SqlParams,
            ]
        );
    }

    #[test]
    fn rejects_missing_triggered_by() {
        let job = job_with(vec![("nb", notebook())]);
        let err = build_payload(&job, ParameterStyle::NotebookParams, map(&[("a", "1")]), None)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingTriggeredBy);

        let err = build_payload(
            &job,
            ParameterStyle::NotebookParams,
            map(&[("triggered_by", "   ")]),
            None,
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::MissingTriggeredBy);
    }

    #[test]
    fn rejects_non_email_triggered_by() {
        let job = job_with(vec![]);
        for bad in ["not-an-email", "a@b", "@b.com", "a@@b.com", "a@b@c.com"] {
            let err = build_payload(
                &job,
                ParameterStyle::JobParameters,
                map(&[("triggered_by", bad)]),
                None,
            )
            .unwrap_err();
            assert_eq!(
                err,
                ValidationError::InvalidEmailShape {
                    value: bad.to_string()
                },
                "{bad}"
            );
        }
    }

    #[test]
    fn accepts_map_style_with_last_write_wins() {
        let job = job_with(vec![("nb", notebook())]);
        let payload = build_payload(
            &job,
            ParameterStyle::NotebookParams,
            map(&[
                ("triggered_by", "x@y.org"),
                ("date", "2024-01-01"),
                ("", "dropped"),
                ("triggered_by", "a@b.com"),
            ]),
            None,
        )
        .unwrap();
        assert_eq!(payload.job_id, 99);
        assert_eq!(
            payload.parameters,
            ParameterEncoding::NotebookParams(IndexMap::from([
                ("triggered_by".to_string(), "a@b.com".to_string()),
                ("date".to_string(), "2024-01-01".to_string()),
            ]))
        );
        assert_eq!(payload.tasks, None);
    }

    #[test]
    fn list_style_extracts_flag_value() {
        let job = job_with(vec![("py", python())]);
        let tokens = vec!["--triggered_by=a@b.com".to_string(), "--x=1".to_string()];
        assert_eq!(triggered_by_from_tokens(&tokens), Some("a@b.com"));

        let payload = build_payload(
            &job,
            ParameterStyle::PythonParams,
            list(&["--triggered_by=a@b.com", "", "--x=1"]),
            Some(vec!["py".into()]),
        )
        .unwrap();
        assert_eq!(
            payload.parameters,
            ParameterEncoding::PythonParams(tokens)
        );
        assert_eq!(payload.tasks, Some(vec!["py".to_string()]));
    }

    #[test]
    fn list_style_without_flag_is_missing() {
        let job = job_with(vec![("jar", TaskKind::JarSubmit { main_class_name: None })]);
        let err = build_payload(&job, ParameterStyle::JarParams, list(&["--triggered_by="]), None)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingTriggeredBy);
        let err = build_payload(&job, ParameterStyle::JarParams, list(&["a@b.com"]), None)
            .unwrap_err();
        assert_eq!(err, ValidationError::MissingTriggeredBy);
    }

    #[test]
    fn rejects_style_the_job_cannot_take() {
        let job = job_with(vec![("nb", notebook())]);
        let err = build_payload(
            &job,
            ParameterStyle::SqlParams,
            map(&[("triggered_by", "a@b.com")]),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnsupportedStyle {
                style: ParameterStyle::SqlParams
            }
        );
    }

    #[test]
    fn rejects_shape_mismatch() {
        let job = job_with(vec![("py", python())]);
        let err = build_payload(
            &job,
            ParameterStyle::PythonParams,
            map(&[("triggered_by", "a@b.com")]),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ValidationError::ShapeMismatch { .. }));
    }

    #[test]
    fn checks_task_subset() {
        let job = job_with(vec![("nb", notebook())]);
        let input = map(&[("triggered_by", "a@b.com")]);
        assert_eq!(
            build_payload(&job, ParameterStyle::JobParameters, input.clone(), Some(vec![]))
                .unwrap_err(),
            ValidationError::EmptyTaskSubset
        );
        assert_eq!(
            build_payload(
                &job,
                ParameterStyle::JobParameters,
                input,
                Some(vec!["nope".into()])
            )
            .unwrap_err(),
            ValidationError::UnknownTaskKey { key: "nope".into() }
        );
    }

    #[test]
    fn prefill_per_style() {
        let job = job_with(vec![("py", python())]);
        assert_eq!(
            initial_input(&job, ParameterStyle::JobParameters),
            map(&[("table", "users"), ("triggered_by", "")])
        );
        assert_eq!(
            initial_input(&job, ParameterStyle::PythonNamedParams),
            map(&[("triggered_by", "")])
        );
        assert_eq!(
            initial_input(&job, ParameterStyle::PythonParams),
            list(&["--triggered_by="])
        );
    }
}
