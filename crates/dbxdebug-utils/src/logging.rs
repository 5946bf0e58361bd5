//! # Logging Utilities
//!
//! Subscriber setup for the `tracing` events the dbxdebug crates emit.
//!
//! Logs always go to stderr: `read-mem` writes raw memory to stdout, and log
//! lines mixed into it would corrupt the dump.
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Filter directives; overrides the level passed in code
//!   (e.g. `RUST_LOG=dbxdebug_protocol=trace`)
//! - `DBX_LOG_FORMAT`: Output format (`pretty` or `json`, default: `pretty`)
//! - `DBX_LOG_FILE`: Optional log file path; a copy of every event is written
//!   there too, rotated daily
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbxdebug_utils::{init_logging_with_level, LogFormat, LogLevel};
//!
//! // Keep the guard alive until exit, or buffered file output is lost.
//! let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Pretty)?;
//! tracing::debug!("connected");
//! # Ok::<(), dbxdebug_utils::LoggingError>(())
//! ```

use std::env;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Utc;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Environment variable selecting the output format.
pub const FORMAT_ENV: &str = "DBX_LOG_FORMAT";

/// Environment variable naming an extra log file.
pub const FILE_ENV: &str = "DBX_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown log format: {s}. Use 'pretty' or 'json'")),
        }
    }
}

/// Minimum level shown when `RUST_LOG` is not set
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel
{
    Error,
    /// Default for the CLI
    Warn,
    /// `-v`
    Info,
    /// `--debug`
    Debug,
    /// Includes raw packet traffic when packet tracing is on
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(format!(
                "Unknown log level: {s}. Use 'error', 'warn', 'info', 'debug', or 'trace'"
            )),
        }
    }
}

/// Keeps the background log file writer running
///
/// Dropping the guard flushes and stops the file writer. Hold it in `main`
/// for the life of the program.
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct LogGuard
{
    file_writer: Option<WorkerGuard>,
    file: Option<PathBuf>,
}

impl LogGuard
{
    /// Log file in use, if `DBX_LOG_FILE` was set.
    #[must_use]
    pub fn file(&self) -> Option<&Path>
    {
        self.file.as_deref()
    }
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// `DBX_LOG_FORMAT` holds an unknown value
    #[error("Invalid {FORMAT_ENV}: {0}")]
    InvalidFormat(String),

    /// `DBX_LOG_FILE` does not name a file
    #[error("Invalid {FILE_ENV}: {0:?} has no file name")]
    InvalidFile(PathBuf),

    /// A global subscriber is already installed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),
}

/// Initialize logging at `warn`, with the format taken from `DBX_LOG_FORMAT`
///
/// ## Errors
///
/// Returns an error if `DBX_LOG_FORMAT` or `DBX_LOG_FILE` is invalid, or if
/// logging is already initialized.
pub fn init_logging() -> Result<LogGuard, LoggingError>
{
    init_logging_with_level(LogLevel::Warn, format_from_env()?)
}

/// Initialize logging with an explicit level and format
///
/// `RUST_LOG`, when set to valid directives, replaces `level`.
///
/// ## Errors
///
/// Returns an error if `DBX_LOG_FILE` is invalid or logging is already
/// initialized.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LogGuard, LoggingError>
{
    let level = Level::from(level);
    let mut layers = vec![console_layer(format, env_filter(level))];
    let mut guard = LogGuard::default();

    if let Some(path) = env::var_os(FILE_ENV).map(PathBuf::from) {
        let (layer, writer) = file_layer(format, &path, env_filter(level))?;
        layers.push(layer);
        guard.file_writer = Some(writer);
        guard.file = Some(path);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;

    tracing::debug!(
        %level,
        ?format,
        file = ?guard.file,
        started_at = %Utc::now().to_rfc3339(),
        "logging initialized"
    );
    Ok(guard)
}

/// Format named by `DBX_LOG_FORMAT`, or the default when it is unset.
///
/// ## Errors
///
/// `InvalidFormat` if the variable is set to an unknown format.
pub fn format_from_env() -> Result<LogFormat, LoggingError>
{
    match env::var(FORMAT_ENV) {
        Ok(value) => value.parse().map_err(LoggingError::InvalidFormat),
        Err(_) => Ok(LogFormat::default()),
    }
}

fn env_filter(default_level: Level) -> EnvFilter
{
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.to_string()))
}

fn console_layer(format: LogFormat, filter: EnvFilter) -> BoxedLayer
{
    let layer = fmt::layer()
        .with_target(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_writer(io::stderr);

    match format {
        LogFormat::Pretty => layer
            .with_ansi(io::stderr().is_terminal())
            .with_filter(filter)
            .boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn file_layer(format: LogFormat, path: &Path, filter: EnvFilter) -> Result<(BoxedLayer, WorkerGuard), LoggingError>
{
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InvalidFile(path.to_path_buf()))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let appender = tracing_appender::rolling::daily(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339())
        .with_ansi(false);

    let layer = match format {
        LogFormat::Pretty => layer.with_filter(filter).boxed(),
        LogFormat::Json => layer.json().with_filter(filter).boxed(),
    };
    Ok((layer, guard))
}
