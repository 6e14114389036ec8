//! Diagnostic logging for the reader.
//!
//! [`init`] installs one global `tracing` subscriber writing to a rolling file and to stderr.
//! Library code only emits events; installing the subscriber is left to the binary embedding the
//! core. Filters come from `COMIC_READER_LOG`, then `RUST_LOG`, e.g.
//! `COMIC_READER_LOG=load=debug,book::navigation=trace`.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use anyhow::{Context, anyhow};
use tracing_appender::rolling::Rotation;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use crate::Result;

pub use tracing_subscriber::filter::LevelFilter as LogLevel;

const FILTER_VARS: [&str; 2] = ["COMIC_READER_LOG", "RUST_LOG"];
const DEFAULT_PREFIX: &str = "comic-reader";

static HANDLE: OnceLock<LogHandle> = OnceLock::new();

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LogRolling {
    Hourly,
    Daily,
    Never,
}

impl From<LogRolling> for Rotation {
    fn from(rolling: LogRolling) -> Self {
        match rolling {
            LogRolling::Hourly => Rotation::HOURLY,
            LogRolling::Daily => Rotation::DAILY,
            LogRolling::Never => Rotation::NEVER,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub directory: PathBuf,
    /// Log files are named `<prefix>.<date>.log`.
    pub file_prefix: String,
    /// Number of log files kept when starting up; `None` keeps everything.
    pub retention: Option<usize>,
    pub file_level: LevelFilter,
    pub console_level: LevelFilter,
    /// Forward records from crates using `log` (the zip crate among them).
    pub capture_log: bool,
    /// Explicit filter directive; falls back to the environment.
    pub env_filter: Option<String>,
    pub rolling: LogRolling,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            file_prefix: DEFAULT_PREFIX.to_string(),
            retention: Some(10),
            file_level: LevelFilter::DEBUG,
            console_level: if cfg!(debug_assertions) {
                LevelFilter::INFO
            } else {
                LevelFilter::WARN
            },
            capture_log: true,
            env_filter: filter_from_env(),
            rolling: LogRolling::Daily,
        }
    }
}

impl LogConfig {
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = directory.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_filter(mut self, directive: impl Into<String>) -> Self {
        self.env_filter = Some(directive.into());
        self
    }
}

/// Keeps the non-blocking file writer alive; dropping it would lose buffered events.
#[derive(Debug)]
pub struct LogHandle {
    _guard: tracing_appender::non_blocking::WorkerGuard,
    directory: PathBuf,
    file_prefix: String,
}

impl LogHandle {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }
}

/// Install the global subscriber. Only the first call configures anything; later calls return
/// the handle created by the first one.
pub fn init(config: LogConfig) -> Result<&'static LogHandle> {
    if let Some(handle) = HANDLE.get() {
        return Ok(handle);
    }
    let handle = install(config)?;
    Ok(HANDLE.get_or_init(|| handle))
}

fn install(config: LogConfig) -> Result<LogHandle> {
    if config.capture_log {
        let max = config.file_level.max(config.console_level);
        // Fails only when another logger is already set, which is fine to ignore.
        let _ = tracing_log::LogTracer::builder().with_max_level(as_log_level(max)).init();
    }

    fs::create_dir_all(&config.directory)
        .with_context(|| format!("creating log directory {}", config.directory.display()))?;
    if let Some(keep) = config.retention.filter(|keep| *keep > 0) {
        prune(&config.directory, &config.file_prefix, keep).context("pruning old log files")?;
    }

    let appender = tracing_appender::rolling::Builder::new()
        .rotation(config.rolling.into())
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .context("creating rolling log file")?;
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let directive = config
        .env_filter
        .or_else(filter_from_env)
        .unwrap_or_else(|| if cfg!(debug_assertions) { "debug" } else { "info" }.to_string());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("parsing log filter {directive:?}"))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_target(true)
        .with_filter(config.file_level);
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(config.console_level);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    tracing::debug!(target: "log", directory = ?config.directory, "logging initialised");
    Ok(LogHandle { _guard: guard, directory: config.directory, file_prefix: config.file_prefix })
}

fn filter_from_env() -> Option<String> {
    FILTER_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .filter(|directive| !directive.trim().is_empty())
}

fn as_log_level(level: LevelFilter) -> log::LevelFilter {
    match level {
        LevelFilter::OFF => log::LevelFilter::Off,
        LevelFilter::ERROR => log::LevelFilter::Error,
        LevelFilter::WARN => log::LevelFilter::Warn,
        LevelFilter::INFO => log::LevelFilter::Info,
        LevelFilter::DEBUG => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Delete the oldest `<prefix>*` files so at most `keep` remain.
fn prune(directory: &Path, prefix: &str, keep: usize) -> Result<()> {
    let mut files: Vec<(PathBuf, SystemTime)> = fs::read_dir(directory)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let meta = entry.metadata().ok().filter(|meta| meta.is_file())?;
            let path = entry.path();
            let stem = path.file_stem().and_then(OsStr::to_str)?;
            if !stem.starts_with(prefix) {
                return None;
            }
            Some((path, meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)))
        })
        .collect();

    if files.len() <= keep {
        return Ok(());
    }
    files.sort_by_key(|(_, modified)| *modified);
    let excess = files.len() - keep;
    for (path, _) in files.into_iter().take(excess) {
        let _ = fs::remove_file(path);
    }
    Ok(())
}

fn default_directory() -> PathBuf {
    directories::ProjectDirs::from("com", "ComicReader", "comic-reader")
        .map(|dirs| dirs.data_dir().join("logs"))
        .unwrap_or_else(|| std::env::temp_dir().join("comic-reader-logs"))
}
