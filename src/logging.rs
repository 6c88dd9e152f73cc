use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

/// Default log location for interactive sessions.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|d| d.join("databricks-jobs-cli").join("app.log"))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber.
///
/// Logs go to `log_file` when given. The TUI owns the terminal, so interactive
/// sessions fall back to the default log file instead of stderr.
pub fn init(log_file: Option<&Path>, interactive: bool) -> Result<()> {
    let path = match log_file {
        Some(p) => Some(p.to_path_buf()),
        None if interactive => default_log_path(),
        None => None,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter());
    let res = match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create log directory {}", parent.display()))?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None if interactive => return Ok(()),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    res.map_err(|e| anyhow::anyhow!("install log subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_path_is_under_app_dir() {
        if let Some(p) = default_log_path() {
            assert!(p.ends_with("databricks-jobs-cli/app.log"));
        }
    }
}
