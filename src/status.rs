//! Run status normalization.
//!
//! The runs API reports state in two overlapping shapes (`status` and the legacy
//! `state` block), either of which may be partially populated. Everything here
//! reduces a [`RunRecord`] to the strings shown in the run history table.

use crate::model::{enum_text, value_text, RunJobParameters, RunParameterEntry, RunRecord};
use serde::Serialize;
use serde_json::Value;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const FINAL_STATES: [&str; 4] = ["SUCCESS", "FAILED", "CANCELED", "TIMEOUT"];
const HEALTHY_STATES: [&str; 3] = ["SUCCESS", "RUNNING", "PENDING"];

pub const UNKNOWN_STATUS: &str = "Unknown";

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

/// Collapse a run's status fields into `(status, error_code)`.
///
/// `status.state` wins over the legacy `state.life_cycle_state`. For finished
/// runs the termination code / result state replaces the generic lifecycle
/// label when it is one of SUCCESS, FAILED, CANCELED or TIMEOUT; anything other
/// than SUCCESS is also reported as the error code. Unrecognised termination
/// codes leave the lifecycle label in place and go to the error code as-is.
pub fn normalize_status(run: &RunRecord) -> (String, String) {
    if let Some(status) = run.status.as_ref() {
        if let Some(mut label) = non_empty(enum_text(status.state.as_ref())) {
            let mut error_code = String::new();
            if label == "TERMINATING" || label == "TERMINATED" {
                if let Some(details) = status.termination_details.as_ref() {
                    if let Some(code) = non_empty(enum_text(details.code.as_ref())) {
                        if FINAL_STATES.contains(&code.as_str()) {
                            if code != "SUCCESS" {
                                error_code = code.clone();
                            }
                            label = code;
                        } else {
                            error_code = code;
                        }
                    } else if let Some(message) = non_empty(enum_text(details.message.as_ref())) {
                        error_code = message;
                    }
                }
            }
            return (label, error_code);
        }
    }

    if let Some(state) = run.state.as_ref() {
        if let Some(mut label) = non_empty(enum_text(state.life_cycle_state.as_ref())) {
            let mut error_code = String::new();
            if label == "TERMINATED" {
                let result = enum_text(state.result_state.as_ref());
                if FINAL_STATES.contains(&result.as_str()) {
                    if result != "SUCCESS" {
                        error_code = result.clone();
                    }
                    label = result;
                }
            }
            if error_code.is_empty() && !HEALTHY_STATES.contains(&label.as_str()) {
                error_code = enum_text(state.state_message.as_ref());
            }
            return (label, error_code);
        }
    }

    (UNKNOWN_STATUS.to_string(), String::new())
}

/// Wall-clock duration in whole seconds, e.g. `"125s"`.
///
/// Zero timestamps count as missing: unfinished runs report `end_time = 0`.
pub fn format_duration(run: &RunRecord) -> String {
    let present = |v: Option<i64>| v.filter(|ms| *ms != 0);
    if let Some(ms) = present(run.execution_duration) {
        return format!("{}s", ms / 1000);
    }
    match (present(run.start_time), present(run.end_time)) {
        (Some(start), Some(end)) => format!("{}s", (end - start) / 1000),
        _ => String::new(),
    }
}

/// Parameter value text; a null value reads `None`.
fn param_text(v: &Value) -> String {
    match v {
        Value::Null => "None".to_string(),
        other => value_text(other),
    }
}

fn push_entry(out: &mut Vec<String>, entry: &RunParameterEntry) {
    match entry {
        RunParameterEntry::Named { name, value, .. } => {
            out.push(format!("{}: {}", name, param_text(value)))
        }
        RunParameterEntry::Fields(fields) => {
            for (k, v) in fields {
                out.push(format!("{}: {}", k, param_text(v)));
            }
        }
        RunParameterEntry::Raw(v) => out.push(param_text(v)),
    }
}

/// Parameters a run was started with, as `"k: v, k: v"`, or `"None"`.
pub fn flatten_parameters(run: &RunRecord) -> String {
    let mut out = Vec::new();

    match run.job_parameters.as_ref().filter(|p| !p.is_empty()) {
        Some(RunJobParameters::Entries(entries)) => {
            for entry in entries {
                push_entry(&mut out, entry);
            }
        }
        Some(RunJobParameters::Map(map)) => {
            for (k, v) in map {
                out.push(format!("{}: {}", k, param_text(v)));
            }
        }
        Some(RunJobParameters::Other(v)) => out.push(param_text(v)),
        None => {
            if let Some(ov) = run.overriding_parameters.as_ref() {
                for map in [
                    &ov.job_parameters,
                    &ov.notebook_params,
                    &ov.python_named_params,
                ]
                .into_iter()
                .flatten()
                {
                    out.extend(map.iter().map(|(k, v)| format!("{k}: {v}")));
                }
                if let Some(list) = ov.python_params.as_ref() {
                    out.extend(list.iter().map(param_text));
                }
            }
        }
    }

    if out.is_empty() {
        "None".to_string()
    } else {
        out.join(", ")
    }
}

/// Start time as `YYYY-MM-DD HH:MM:SS` in `offset`; empty when unknown.
pub fn format_start_time(run: &RunRecord, offset: UtcOffset) -> String {
    let Some(ms) = run.start_time.filter(|ms| *ms != 0) else {
        return String::new();
    };
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000)
        .ok()
        .and_then(|t| t.to_offset(offset).format(fmt).ok())
        .unwrap_or_default()
}

/// How the run was launched, from its trigger type.
pub fn launched_by(run: &RunRecord) -> &'static str {
    match enum_text(run.trigger.as_ref()).as_str() {
        "PERIODIC" => "By scheduler",
        "RETRY" => "Retry",
        "RUN_JOB_TASK" => "By parent job",
        "FILE_ARRIVAL" => "File arrival",
        "TABLE" => "Table update",
        "CONTINUOUS" | "CONTINUOUS_RESTART" => "Continuous",
        _ => "Manually",
    }
}

/// One display row of the run history table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRow {
    pub start_time: String,
    pub run_id: i64,
    pub launched: &'static str,
    pub duration: String,
    pub status: String,
    pub error_code: String,
    pub parameters: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl RunRow {
    pub fn from_run(run: &RunRecord, offset: UtcOffset) -> Self {
        let (status, error_code) = normalize_status(run);
        Self {
            start_time: format_start_time(run, offset),
            run_id: run.run_id,
            launched: launched_by(run),
            duration: format_duration(run),
            status,
            error_code,
            parameters: flatten_parameters(run),
            url: run.run_page_url.clone(),
        }
    }
}

/// Local UTC offset, falling back to UTC where the platform cannot tell.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EnumText, OverridingParameters, RunState, RunStatus, TerminationDetails};
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn with_status(state: &str, code: Option<&str>, message: Option<&str>) -> RunRecord {
        RunRecord {
            run_id: 1,
            status: Some(RunStatus {
                state: Some(state.into()),
                termination_details: Some(TerminationDetails {
                    code: code.map(EnumText::from),
                    message: message.map(EnumText::from),
                }),
            }),
            ..Default::default()
        }
    }

    fn with_state(life: &str, result: Option<&str>, message: Option<&str>) -> RunRecord {
        RunRecord {
            run_id: 2,
            state: Some(RunState {
                life_cycle_state: Some(life.into()),
                result_state: result.map(EnumText::from),
                state_message: message.map(EnumText::from),
            }),
            ..Default::default()
        }
    }

    fn pair(s: &str, e: &str) -> (String, String) {
        (s.to_string(), e.to_string())
    }

    #[test]
    fn terminated_success_has_no_error_code() {
        let run = with_status("TERMINATED", Some("SUCCESS"), None);
        assert_eq!(normalize_status(&run), pair("SUCCESS", ""));
    }

    #[test]
    fn terminated_failure_reports_code() {
        let run = with_status("TERMINATED", Some("FAILED"), None);
        assert_eq!(normalize_status(&run), pair("FAILED", "FAILED"));
        let run = with_status("TERMINATING", Some("CANCELED"), None);
        assert_eq!(normalize_status(&run), pair("CANCELED", "CANCELED"));
    }

    #[test]
    fn running_passes_through() {
        let run = with_status("RUNNING", Some("FAILED"), None);
        assert_eq!(normalize_status(&run), pair("RUNNING", ""));
    }

    #[test]
    fn unrecognised_termination_code_keeps_lifecycle_label() {
        let run = with_status("TERMINATED", Some("DRIVER_ERROR"), Some("boom"));
        assert_eq!(normalize_status(&run), pair("TERMINATED", "DRIVER_ERROR"));
    }

    #[test]
    fn termination_message_without_code() {
        let run = with_status("TERMINATED", None, Some("cluster lost"));
        assert_eq!(normalize_status(&run), pair("TERMINATED", "cluster lost"));
    }

    #[test]
    fn legacy_state_result() {
        let run = with_state("TERMINATED", Some("TIMEOUT"), Some("took too long"));
        assert_eq!(normalize_status(&run), pair("TIMEOUT", "TIMEOUT"));
        let run = with_state("TERMINATED", Some("SUCCESS"), Some("done"));
        assert_eq!(normalize_status(&run), pair("SUCCESS", ""));
    }

    #[test]
    fn legacy_state_message_fallback() {
        let run = with_state("INTERNAL_ERROR", None, Some("Run failed with error"));
        assert_eq!(
            normalize_status(&run),
            pair("INTERNAL_ERROR", "Run failed with error")
        );
        let run = with_state("PENDING", None, Some("Waiting for cluster"));
        assert_eq!(normalize_status(&run), pair("PENDING", ""));
        let run = with_state("TERMINATED", Some("MAXIMUM_CONCURRENT_RUNS_REACHED"), Some("skipped"));
        assert_eq!(normalize_status(&run), pair("TERMINATED", "skipped"));
    }

    #[test]
    fn status_wins_over_legacy_state() {
        let mut run = with_state("TERMINATED", Some("FAILED"), None);
        run.status = Some(RunStatus {
            state: Some("QUEUED".into()),
            termination_details: None,
        });
        assert_eq!(normalize_status(&run), pair("QUEUED", ""));
    }

    #[test]
    fn nothing_known() {
        assert_eq!(normalize_status(&RunRecord::default()), pair("Unknown", ""));
        let run = RunRecord {
            state: Some(RunState {
                state_message: Some("orphan".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(normalize_status(&run), pair("Unknown", ""));
    }

    #[test]
    fn wrapped_enum_fields_are_read() {
        let run: RunRecord = serde_json::from_value(json!({
            "run_id": 5,
            "status": {
                "state": {"value": "TERMINATED"},
                "termination_details": {"code": {"name": "FAILED"}}
            }
        }))
        .unwrap();
        assert_eq!(normalize_status(&run), pair("FAILED", "FAILED"));
    }

    #[test]
    fn duration_formats() {
        let run = RunRecord {
            execution_duration: Some(125_000),
            ..Default::default()
        };
        assert_eq!(format_duration(&run), "125s");

        let run = RunRecord {
            start_time: Some(1000),
            end_time: Some(9000),
            ..Default::default()
        };
        assert_eq!(format_duration(&run), "8s");

        let run = RunRecord {
            start_time: Some(1000),
            end_time: Some(2999),
            ..Default::default()
        };
        assert_eq!(format_duration(&run), "1s");

        assert_eq!(format_duration(&RunRecord::default()), "");

        let running = RunRecord {
            start_time: Some(1_700_000_000_000),
            end_time: Some(0),
            execution_duration: Some(0),
            ..Default::default()
        };
        assert_eq!(format_duration(&running), "");
    }

    #[test]
    fn parameters_from_job_parameter_list() {
        let run: RunRecord = serde_json::from_value(json!({
            "run_id": 1,
            "job_parameters": [{"name": "table", "value": "customers", "default": "users"}]
        }))
        .unwrap();
        assert_eq!(flatten_parameters(&run), "table: customers");
        assert_eq!(flatten_parameters(&RunRecord::default()), "None");
    }

    #[test]
    fn parameters_from_mixed_entries_and_maps() {
        let run: RunRecord = serde_json::from_value(json!({
            "run_id": 1,
            "job_parameters": [
                {"name": "a", "value": "1"},
                {"name": "b", "default": "2"},
                "loose"
            ]
        }))
        .unwrap();
        assert_eq!(flatten_parameters(&run), "a: 1, name: b, default: 2, loose");

        let run: RunRecord = serde_json::from_value(json!({
            "run_id": 1,
            "job_parameters": {"x": "1", "y": 2}
        }))
        .unwrap();
        assert_eq!(flatten_parameters(&run), "x: 1, y: 2");
    }

    #[test]
    fn null_parameter_values_read_none() {
        let run: RunRecord = serde_json::from_value(json!({
            "run_id": 1,
            "job_parameters": [{"name": "env", "value": null}, {"name": "day", "value": "mon"}]
        }))
        .unwrap();
        assert_eq!(flatten_parameters(&run), "env: None, day: mon");
    }

    #[test]
    fn parameters_fall_back_to_overrides_in_fixed_order() {
        let run = RunRecord {
            job_parameters: Some(RunJobParameters::Entries(vec![])),
            overriding_parameters: Some(OverridingParameters {
                python_params: Some(vec![json!("--triggered_by=a@b.com"), json!(3)]),
                notebook_params: Some(IndexMap::from([("nb".to_string(), "1".to_string())])),
                job_parameters: Some(IndexMap::from([("jp".to_string(), "0".to_string())])),
                python_named_params: Some(IndexMap::from([("pn".to_string(), "2".to_string())])),
            }),
            ..Default::default()
        };
        assert_eq!(
            flatten_parameters(&run),
            "jp: 0, nb: 1, pn: 2, --triggered_by=a@b.com, 3"
        );
    }

    #[test]
    fn start_time_and_launch_labels() {
        let run: RunRecord = serde_json::from_value(json!({
            "run_id": 77,
            "start_time": 1_700_000_000_000_i64,
            "execution_duration": 61_500,
            "trigger": "PERIODIC",
            "status": {"state": "TERMINATED", "termination_details": {"code": "SUCCESS"}},
            "run_page_url": "https://example.cloud.databricks.com/#job/1/run/77"
        }))
        .unwrap();
        assert_eq!(format_start_time(&run, UtcOffset::UTC), "2023-11-14 22:13:20");
        let row = RunRow::from_run(&run, UtcOffset::UTC);
        assert_eq!(
            row,
            RunRow {
                start_time: "2023-11-14 22:13:20".into(),
                run_id: 77,
                launched: "By scheduler",
                duration: "61s".into(),
                status: "SUCCESS".into(),
                error_code: String::new(),
                parameters: "None".into(),
                url: Some("https://example.cloud.databricks.com/#job/1/run/77".into()),
            }
        );
        assert_eq!(launched_by(&RunRecord::default()), "Manually");
    }
}
