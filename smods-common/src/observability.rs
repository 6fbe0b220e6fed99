//! Logging setup for the `smods` binaries.
//!
//! Events go to a daily rolling file (`<dir>/<app>.log.<date>`) and,
//! optionally, to stderr. The filter comes from `RUST_LOG` when set, else from
//! the configured level. [`init_logging`] installs the global subscriber once;
//! later calls return the path chosen by the first one.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Overrides the log directory when none is configured.
pub const LOG_DIR_ENV: &str = "SMODS_LOG_DIR";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Used as the log file stem and the data directory name.
    pub app_name: &'static str,
    /// Explicit log directory; see [`resolve_log_dir`] for the fallbacks.
    pub log_dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Filter directive used when `RUST_LOG` is unset, e.g. `smods=debug,info`.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "smods",
            log_dir: None,
            emit_stderr: false,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

/// Install the global `tracing` subscriber and return today's log file.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Ok(path.clone());
    }

    let dir = resolve_log_dir(config.app_name, config.log_dir.as_deref());
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;
    let path = log_file_path(&dir, config.app_name, Local::now().date_naive());

    let (writer, guard) = tracing_appender::non_blocking(rolling::daily(
        &dir,
        format!("{}.log", config.app_name),
    ));
    let _ = LOG_GUARD.set(guard);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .with_context(|| format!("invalid log filter: {}", config.default_filter))?;

    // Optional layers are no-ops when `None`, so one registry covers every combination.
    let json = config.format == LogFormat::Json;
    let file_text = (!json).then(|| fmt::layer().with_writer(writer.clone()).with_ansi(false));
    let file_json = json.then(|| fmt::layer().json().with_writer(writer));
    let stderr_text =
        (config.emit_stderr && !json).then(|| fmt::layer().with_writer(std::io::stderr));
    let stderr_json =
        (config.emit_stderr && json).then(|| fmt::layer().json().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_text)
        .with(file_json)
        .with(stderr_text)
        .with(stderr_json)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let _ = LOG_PATH.set(path.clone());
    Ok(path)
}

/// Log directory: the explicit one, then `SMODS_LOG_DIR`, then
/// `<local data dir>/<app>/logs`.
pub fn resolve_log_dir(app_name: &str, explicit: Option<&Path>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    if let Some(dir) = std::env::var_os(LOG_DIR_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(app_name)
        .join("logs")
}

/// File the daily appender writes to on `date`.
fn log_file_path(dir: &Path, app_name: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("{app_name}.log.{}", date.format("%Y-%m-%d")))
}
