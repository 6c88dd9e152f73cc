use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub token: Option<String>,
    /// Runs fetched per history page.
    pub page_size: u32,
    pub cache_ttl: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Offset used to render run start times.
    pub utc_offset: time::UtcOffset,
}

/// A job registered with the remote workflow service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireJob")]
pub struct Job {
    pub job_id: i64,
    pub name: Option<String>,
    pub tasks: Vec<Task>,
    /// Job-level parameter name -> default value.
    pub parameters: IndexMap<String, String>,
}

impl Job {
    /// Display label: `"<name> (ID <id>)"`, or the bare id for unnamed jobs.
    pub fn label(&self) -> String {
        match self.name.as_deref().filter(|n| !n.is_empty()) {
            Some(name) => format!("{} (ID {})", name, self.job_id),
            None => self.job_id.to_string(),
        }
    }

    pub fn task_keys(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|t| !t.task_key.is_empty())
            .map(|t| t.task_key.clone())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_key: String,
    pub kind: TaskKind,
}

/// The execution kind of a task, resolved once when the job is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskKind {
    Notebook {
        notebook_path: Option<String>,
    },
    PythonScript {
        python_file: Option<String>,
    },
    PythonWheel {
        package_name: Option<String>,
        entry_point: Option<String>,
    },
    JarSubmit {
        main_class_name: Option<String>,
    },
    SparkSubmit,
    SqlTask {
        warehouse_id: Option<String>,
    },
    DbtTask {
        commands: Vec<String>,
    },
    Unknown,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            TaskKind::Notebook { .. } => "notebook",
            TaskKind::PythonScript { .. } => "python script",
            TaskKind::PythonWheel { .. } => "python wheel",
            TaskKind::JarSubmit { .. } => "jar",
            TaskKind::SparkSubmit => "spark-submit",
            TaskKind::SqlTask { .. } => "sql",
            TaskKind::DbtTask { .. } => "dbt",
            TaskKind::Unknown => "other",
        }
    }

    fn from_wire(task: &WireTask) -> Self {
        let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).map(str::to_string);

        if let Some(nb) = &task.notebook_task {
            return TaskKind::Notebook {
                notebook_path: text(nb, "notebook_path"),
            };
        }
        if let Some(py) = task.spark_python_task.as_ref().or(task.python_task.as_ref()) {
            return TaskKind::PythonScript {
                python_file: text(py, "python_file"),
            };
        }
        if let Some(whl) = &task.python_wheel_task {
            return TaskKind::PythonWheel {
                package_name: text(whl, "package_name"),
                entry_point: text(whl, "entry_point"),
            };
        }
        if let Some(jar) = &task.spark_jar_task {
            return TaskKind::JarSubmit {
                main_class_name: text(jar, "main_class_name"),
            };
        }
        if task.spark_submit_task.is_some() {
            return TaskKind::SparkSubmit;
        }
        if let Some(sql) = &task.sql_task {
            return TaskKind::SqlTask {
                warehouse_id: text(sql, "warehouse_id"),
            };
        }
        if let Some(dbt) = &task.dbt_task {
            let commands = dbt
                .get("commands")
                .and_then(Value::as_array)
                .map(|cmds| {
                    cmds.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            return TaskKind::DbtTask { commands };
        }
        TaskKind::Unknown
    }
}

// Wire shapes of the Jobs API. A job either carries its fields under
// `settings` (jobs/get, jobs/list) or flat (our own serialized form).
#[derive(Debug, Deserialize)]
struct WireJob {
    job_id: i64,
    #[serde(default)]
    settings: Option<WireJobSettings>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tasks: Option<Vec<Task>>,
    #[serde(default)]
    parameters: Option<IndexMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
struct WireJobSettings {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tasks: Vec<WireTask>,
    #[serde(default)]
    parameters: Vec<WireJobParameter>,
}

#[derive(Debug, Deserialize)]
struct WireJobParameter {
    name: String,
    #[serde(default)]
    default: String,
}

#[derive(Debug, Default, Deserialize)]
struct WireTask {
    #[serde(default)]
    task_key: String,
    notebook_task: Option<Value>,
    spark_python_task: Option<Value>,
    python_task: Option<Value>,
    python_wheel_task: Option<Value>,
    spark_jar_task: Option<Value>,
    spark_submit_task: Option<Value>,
    sql_task: Option<Value>,
    dbt_task: Option<Value>,
}

impl From<WireJob> for Job {
    fn from(w: WireJob) -> Self {
        let settings = w.settings.unwrap_or_default();
        let tasks = w.tasks.unwrap_or_else(|| {
            settings
                .tasks
                .iter()
                .map(|t| Task {
                    task_key: t.task_key.clone(),
                    kind: TaskKind::from_wire(t),
                })
                .collect()
        });
        let parameters = w.parameters.unwrap_or_else(|| {
            settings
                .parameters
                .into_iter()
                .map(|p| (p.name, p.default))
                .collect()
        });
        Job {
            job_id: w.job_id,
            name: w.name.or(settings.name),
            tasks,
            parameters,
        }
    }
}

/// Run-time parameter encoding styles accepted by run-now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterStyle {
    JobParameters,
    NotebookParams,
    PythonNamedParams,
    SqlParams,
    PythonParams,
    JarParams,
    SparkSubmitParams,
    DbtCommands,
}

/// Whether a style takes a key/value map or a positional token list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterShape {
    Map,
    List,
}

impl ParameterStyle {
    pub const ALL: [ParameterStyle; 8] = [
        ParameterStyle::JobParameters,
        ParameterStyle::NotebookParams,
        ParameterStyle::PythonNamedParams,
        ParameterStyle::SqlParams,
        ParameterStyle::PythonParams,
        ParameterStyle::JarParams,
        ParameterStyle::SparkSubmitParams,
        ParameterStyle::DbtCommands,
    ];

    /// API field name the encoding is sent under.
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterStyle::JobParameters => "job_parameters",
            ParameterStyle::NotebookParams => "notebook_params",
            ParameterStyle::PythonNamedParams => "python_named_params",
            ParameterStyle::SqlParams => "sql_params",
            ParameterStyle::PythonParams => "python_params",
            ParameterStyle::JarParams => "jar_params",
            ParameterStyle::SparkSubmitParams => "spark_submit_params",
            ParameterStyle::DbtCommands => "dbt_commands",
        }
    }

    pub fn shape(self) -> ParameterShape {
        match self {
            ParameterStyle::JobParameters
            | ParameterStyle::NotebookParams
            | ParameterStyle::PythonNamedParams
            | ParameterStyle::SqlParams => ParameterShape::Map,
            ParameterStyle::PythonParams
            | ParameterStyle::JarParams
            | ParameterStyle::SparkSubmitParams
            | ParameterStyle::DbtCommands => ParameterShape::List,
        }
    }
}

impl fmt::Display for ParameterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParameterStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParameterStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == s)
            .ok_or_else(|| format!("unknown parameter style: {s}"))
    }
}

/// One resolved run-time parameter encoding; serialized under its style name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterEncoding {
    JobParameters(IndexMap<String, String>),
    NotebookParams(IndexMap<String, String>),
    PythonNamedParams(IndexMap<String, String>),
    SqlParams(IndexMap<String, String>),
    PythonParams(Vec<String>),
    JarParams(Vec<String>),
    SparkSubmitParams(Vec<String>),
    DbtCommands(Vec<String>),
}

impl ParameterEncoding {
    pub fn style(&self) -> ParameterStyle {
        match self {
            ParameterEncoding::JobParameters(_) => ParameterStyle::JobParameters,
            ParameterEncoding::NotebookParams(_) => ParameterStyle::NotebookParams,
            ParameterEncoding::PythonNamedParams(_) => ParameterStyle::PythonNamedParams,
            ParameterEncoding::SqlParams(_) => ParameterStyle::SqlParams,
            ParameterEncoding::PythonParams(_) => ParameterStyle::PythonParams,
            ParameterEncoding::JarParams(_) => ParameterStyle::JarParams,
            ParameterEncoding::SparkSubmitParams(_) => ParameterStyle::SparkSubmitParams,
            ParameterEncoding::DbtCommands(_) => ParameterStyle::DbtCommands,
        }
    }
}

/// Body of a run-now request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub job_id: i64,
    #[serde(flatten)]
    pub parameters: ParameterEncoding,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunNowResponse {
    pub run_id: i64,
    #[serde(default)]
    pub number_in_job: Option<i64>,
}

/// A status-like field: either a plain string or an enum wrapper object.
///
/// Objects carrying neither `value` nor `name` fall through to `Other`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumText {
    Plain(String),
    Valued {
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Named {
        name: String,
    },
    Other(Value),
}

impl EnumText {
    /// Textual form: `value`, then `name`, then the raw value itself.
    pub fn text(&self) -> String {
        match self {
            EnumText::Plain(s) => s.clone(),
            EnumText::Valued {
                value: Value::Null,
                name: Some(n),
            } => n.clone(),
            EnumText::Valued { value, .. } => value_text(value),
            EnumText::Named { name } => name.clone(),
            EnumText::Other(v) => value_text(v),
        }
    }
}

impl From<&str> for EnumText {
    fn from(s: &str) -> Self {
        EnumText::Plain(s.to_string())
    }
}

/// Text of an optional enum-like field; absence yields an empty string.
pub fn enum_text(field: Option<&EnumText>) -> String {
    field.map(EnumText::text).unwrap_or_default()
}

/// Render a JSON value the way a person would type it: strings unquoted.
pub fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    #[serde(default)]
    pub state: Option<EnumText>,
    #[serde(default)]
    pub termination_details: Option<TerminationDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminationDetails {
    #[serde(default)]
    pub code: Option<EnumText>,
    #[serde(default)]
    pub message: Option<EnumText>,
}

/// Legacy run state block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub life_cycle_state: Option<EnumText>,
    #[serde(default)]
    pub result_state: Option<EnumText>,
    #[serde(default)]
    pub state_message: Option<EnumText>,
}

/// Resolved job parameters of a run as returned by runs/list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunJobParameters {
    Entries(Vec<RunParameterEntry>),
    Map(serde_json::Map<String, Value>),
    Other(Value),
}

impl RunJobParameters {
    pub fn is_empty(&self) -> bool {
        match self {
            RunJobParameters::Entries(e) => e.is_empty(),
            RunJobParameters::Map(m) => m.is_empty(),
            RunJobParameters::Other(v) => match v {
                Value::Null => true,
                Value::String(s) => s.is_empty(),
                Value::Bool(b) => !b,
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunParameterEntry {
    Named {
        name: String,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    Fields(serde_json::Map<String, Value>),
    Raw(Value),
}

/// Parameters the run was started with, per encoding style.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverridingParameters {
    #[serde(default)]
    pub job_parameters: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub notebook_params: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub python_named_params: Option<IndexMap<String, String>>,
    #[serde(default)]
    pub python_params: Option<Vec<Value>>,
}

/// One run of a job, read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: i64,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub execution_duration: Option<i64>,
    #[serde(default)]
    pub status: Option<RunStatus>,
    #[serde(default)]
    pub state: Option<RunState>,
    #[serde(default)]
    pub job_parameters: Option<RunJobParameters>,
    #[serde(default)]
    pub overriding_parameters: Option<OverridingParameters>,
    #[serde(default)]
    pub trigger: Option<EnumText>,
    #[serde(default)]
    pub run_page_url: Option<String>,
}
