use crate::client::DatabricksClient;
use crate::history::{BatchOutcome, RunHistoryCursor};
use crate::model::{AppConfig, ParameterShape, ParameterStyle};
use crate::orchestrator::Session;
use crate::params::{self, ParameterInput, TRIGGERED_BY, TRIGGERED_BY_FLAG};
use crate::status::RunRow;
use crate::text_summary::{build_jobs_summary, build_runs_summary, build_styles_summary};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::UtcOffset;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "databricks-jobs-cli",
    version,
    about = "Trigger Databricks jobs and browse their run history, with optional TUI"
)]
pub struct Cli {
    /// Workspace host, e.g. adb-123.azuredatabricks.net
    #[arg(long, env = "DATABRICKS_HOST")]
    pub host: String,

    /// Personal access token
    #[arg(long, env = "DATABRICKS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Runs fetched per history page
    #[arg(long, default_value_t = 5)]
    pub page_size: u32,

    /// How long job listings and details stay cached
    #[arg(long, default_value = "60s")]
    pub cache_ttl: humantime::Duration,

    /// HTTP request timeout
    #[arg(long, default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Print JSON instead of text tables (subcommands only)
    #[arg(long, global = true)]
    pub json: bool,

    /// Write logs to this file instead of the default location
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// List jobs with their task kinds
    Jobs,

    /// Show the parameter styles a job accepts
    Styles { job_id: i64 },

    /// Show the run history of a job
    Runs {
        job_id: i64,

        /// Number of history pages to fetch
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },

    /// Trigger a job run
    Trigger {
        job_id: i64,

        /// Parameter encoding style
        #[arg(long, default_value = "job_parameters")]
        style: ParameterStyle,

        /// key=value parameter (map styles)
        #[arg(long = "param", value_parser = parse_key_value)]
        params: Vec<(String, String)>,

        /// Parameter token (list styles)
        #[arg(long = "arg", allow_hyphen_values = true)]
        args: Vec<String>,

        /// Run only these task keys
        #[arg(long = "task")]
        tasks: Vec<String>,

        /// Email address recorded as the run's triggered_by parameter
        #[arg(long)]
        triggered_by: Option<String>,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(format!("expected key=value, got '{s}'")),
    }
}

/// True when this invocation opens the interactive UI.
pub fn is_interactive(args: &Cli) -> bool {
    args.command.is_none() && cfg!(feature = "tui")
}

/// Build an `AppConfig` from CLI arguments.
pub fn build_config(args: &Cli, utc_offset: UtcOffset) -> AppConfig {
    AppConfig {
        host: args.host.clone(),
        token: args.token.clone(),
        page_size: args.page_size.max(1),
        cache_ttl: Duration::from(args.cache_ttl),
        request_timeout: Duration::from(args.timeout),
        user_agent: format!("databricks-jobs-cli/{}", env!("CARGO_PKG_VERSION")),
        utc_offset,
    }
}

pub async fn run(args: Cli, utc_offset: UtcOffset) -> Result<()> {
    let cfg = build_config(&args, utc_offset);
    let client = DatabricksClient::new(&cfg).context("build HTTP client")?;
    let mut session = Session::new(Arc::new(client), cfg.cache_ttl);

    let Some(command) = args.command.clone() else {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(cfg, session).await;
        }
        #[cfg(not(feature = "tui"))]
        {
            // Fallback when built without TUI support.
            return run_jobs(&args, &mut session).await;
        }
    };

    match command {
        Command::Jobs => run_jobs(&args, &mut session).await,
        Command::Styles { job_id } => run_styles(&args, &mut session, job_id).await,
        Command::Runs { job_id, pages } => run_runs(&args, &cfg, &mut session, job_id, pages).await,
        Command::Trigger {
            job_id,
            style,
            params,
            args: tokens,
            tasks,
            triggered_by,
        } => {
            let input = trigger_input(style, params, tokens, triggered_by);
            let subset = (!tasks.is_empty()).then_some(tasks);
            run_trigger(&args, &mut session, job_id, style, input, subset).await
        }
    }
}

async fn emit(lines: Vec<String>, notes: Vec<String>) {
    let (out_tx, out_handle) = spawn_output_writer();
    for note in notes {
        let _ = out_tx.send(OutputLine::Stderr(note));
    }
    for line in lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    drop(out_tx);
    let _ = out_handle.await;
}

async fn run_jobs(args: &Cli, session: &mut Session) -> Result<()> {
    let jobs = session.jobs(false).await?;
    let lines = if args.json {
        vec![serde_json::to_string_pretty(&jobs)?]
    } else {
        build_jobs_summary(&jobs).lines
    };
    emit(lines, Vec::new()).await;
    Ok(())
}

async fn run_styles(args: &Cli, session: &mut Session, job_id: i64) -> Result<()> {
    let job = session.job(job_id).await?;
    let styles = params::style_choices(&job);
    let lines = if args.json {
        vec![serde_json::to_string_pretty(&styles)?]
    } else {
        build_styles_summary(&job, &styles).lines
    };
    emit(lines, Vec::new()).await;
    Ok(())
}

async fn run_runs(
    args: &Cli,
    cfg: &AppConfig,
    session: &mut Session,
    job_id: i64,
    pages: u32,
) -> Result<()> {
    let job = session.job(job_id).await?;
    let mut cursor = RunHistoryCursor::default();
    cursor.select_job(job_id);

    let mut notes = Vec::new();
    for _ in 0..pages.max(1) {
        match cursor.load_more(session.client(), cfg.page_size).await {
            BatchOutcome::Appended(0) => break,
            BatchOutcome::Appended(n) => notes.push(format!("Loaded {n} run(s)")),
            BatchOutcome::Failed(e) => return Err(e.into()),
            BatchOutcome::Stale => break,
        }
        if cursor.likely_complete() {
            break;
        }
    }

    let rows: Vec<RunRow> = cursor
        .runs()
        .iter()
        .map(|r| RunRow::from_run(r, cfg.utc_offset))
        .collect();
    let lines = if args.json {
        vec![serde_json::to_string_pretty(&rows)?]
    } else {
        build_runs_summary(&job, &rows, cursor.likely_complete()).lines
    };
    emit(lines, notes).await;
    Ok(())
}

/// Assemble run-time input from command-line flags.
///
/// `--triggered-by` is folded into the shape `style` expects. Flags of the
/// other shape are passed through so validation reports the mismatch.
fn trigger_input(
    style: ParameterStyle,
    params: Vec<(String, String)>,
    tokens: Vec<String>,
    triggered_by: Option<String>,
) -> ParameterInput {
    match style.shape() {
        ParameterShape::Map if tokens.is_empty() || !params.is_empty() => {
            let mut entries = params;
            if let Some(email) = triggered_by {
                entries.push((TRIGGERED_BY.to_string(), email));
            }
            ParameterInput::Map(entries)
        }
        ParameterShape::Map => ParameterInput::List(tokens),
        ParameterShape::List if params.is_empty() || !tokens.is_empty() => {
            let mut list = Vec::with_capacity(tokens.len() + 1);
            if let Some(email) = triggered_by {
                list.push(format!("{TRIGGERED_BY_FLAG}{email}"));
            }
            list.extend(tokens);
            ParameterInput::List(list)
        }
        ParameterShape::List => ParameterInput::Map(params),
    }
}

async fn run_trigger(
    args: &Cli,
    session: &mut Session,
    job_id: i64,
    style: ParameterStyle,
    input: ParameterInput,
    subset: Option<Vec<String>>,
) -> Result<()> {
    let job = session.job(job_id).await?;
    let payload = params::build_payload(&job, style, input, subset)?;
    let resp = session.submit(&payload).await?;

    let lines = if args.json {
        vec![serde_json::to_string_pretty(&resp)?]
    } else {
        vec![format!(
            "Workflow triggered successfully ✅ run_id {}",
            resp.run_id
        )]
    };
    emit(lines, Vec::new()).await;
    Ok(())
}
