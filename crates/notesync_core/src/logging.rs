//! Process-wide file logging for the sync engine.
//!
//! # Responsibility
//! - Start rolling file logs once per process.
//! - Capture panics as sanitized log events.
//!
//! # Invariants
//! - Initialization is idempotent for an identical `LogConfig` and rejects
//!   any other config afterwards.
//! - Initialization never panics.
//! - Events carry ids, counts and durations only; note titles and bodies
//!   are never logged.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "notesync";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

/// Environment variable overriding the log level.
pub const LOG_LEVEL_ENV: &str = "NOTESYNC_LOG_LEVEL";
/// Environment variable naming the log directory.
pub const LOG_DIR_ENV: &str = "NOTESYNC_LOG_DIR";

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!(
                "unsupported log level `{other}`; expected trace|debug|info|warn|error"
            )),
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated logging target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: LogLevel,
    pub dir: PathBuf,
}

impl LogConfig {
    /// `dir` must be absolute; surrounding whitespace is ignored.
    pub fn new(level: &str, dir: &str) -> Result<Self, String> {
        let level = level.parse::<LogLevel>()?;
        let dir = dir.trim();
        if dir.is_empty() {
            return Err("log directory cannot be empty".to_string());
        }
        let dir = PathBuf::from(dir);
        if !dir.is_absolute() {
            return Err(format!(
                "log directory must be an absolute path, got `{}`",
                dir.display()
            ));
        }
        Ok(Self { level, dir })
    }

    /// Reads `NOTESYNC_LOG_DIR` / `NOTESYNC_LOG_LEVEL` through `lookup`.
    ///
    /// `Ok(None)` when no directory is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>, String> {
        let Some(dir) = lookup(LOG_DIR_ENV).filter(|value| !value.trim().is_empty()) else {
            return Ok(None);
        };
        let level = lookup(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string());
        Self::new(&level, &dir).map(Some)
    }
}

struct ActiveLogger {
    config: LogConfig,
    _handle: LoggerHandle,
}

/// Starts file logging at `level` into the absolute directory `log_dir`.
///
/// # Errors
/// - Unsupported `level`, or an empty/relative `log_dir`.
/// - The directory cannot be created or the backend fails to start.
/// - Logging is already active with a different level or directory.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let config = LogConfig::new(level, log_dir)?;
    let active = ACTIVE.get_or_try_init(|| start(config.clone()))?;
    if active.config != config {
        return Err(format!(
            "logging already active (level={} dir=`{}`); refusing to switch to level={} dir=`{}`",
            active.config.level,
            active.config.dir.display(),
            config.level,
            config.dir.display()
        ));
    }
    Ok(())
}

/// Starts logging from the process environment.
///
/// Returns `Ok(false)` when no log directory is configured.
pub fn init_logging_from_env() -> Result<bool, String> {
    match LogConfig::from_lookup(|key| std::env::var(key).ok())? {
        Some(config) => {
            let dir = config.dir.to_string_lossy().into_owned();
            init_logging(config.level.as_str(), &dir).map(|()| true)
        }
        None => Ok(false),
    }
}

/// Active `(level, log_dir)`, or `None` before initialization.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.config.level.as_str(), active.config.dir.clone()))
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        LogLevel::Debug.as_str()
    } else {
        LogLevel::Info.as_str()
    }
}

fn start(config: LogConfig) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&config.dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            config.dir.display()
        )
    })?;

    let handle = Logger::try_with_str(config.level.as_str())
        .map_err(|err| format!("invalid log spec `{}`: {err}", config.level))?
        .log_to_file(file_spec(&config.dir))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook();
    info!(
        "event=engine_start module=core status=ok os={} debug_build={} version={} level={}",
        std::env::consts::OS,
        cfg!(debug_assertions),
        env!("CARGO_PKG_VERSION"),
        config.level
    );

    Ok(ActiveLogger {
        config,
        _handle: handle,
    })
}

fn file_spec(dir: &Path) -> FileSpec {
    FileSpec::default()
        .directory(dir)
        .basename(LOG_FILE_BASENAME)
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| info.payload().downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");
        error!(
            "event=panic_captured module=core status=error location={location} payload={}",
            one_line(payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(info);
    }));
}

/// Flattens `text` onto one line, keeping at most `limit` chars.
fn one_line(text: &str, limit: usize) -> String {
    let mut out: String = text
        .chars()
        .map(|ch| if ch == '\n' || ch == '\r' { ' ' } else { ch })
        .take(limit)
        .collect();
    if text.chars().count() > limit {
        out.push_str("...");
    }
    out
}
