//! Logging setup for the application.
//!
//! Initializes a global tracing subscriber that writes every event to a
//! per-session log file and only warnings and errors to stderr, so the
//! interactive menu is not drowned in diagnostics. Files are named by date plus
//! a per-day session counter and kept to a bounded count.

use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::OnceLock,
    time::SystemTime,
};

use time::{OffsetDateTime, UtcOffset, format_description::FormatItem, macros::format_description};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, Registry, filter::LevelFilter, fmt, prelude::*};

use crate::app_dirs;

/// Maximum number of log files to retain.
const MAX_LOG_FILES: usize = 20;
const LOG_FILE_PREFIX: &str = "ressys";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Errors that may occur while initializing logging.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// No platform-specific data directory could be resolved.
    #[error("No suitable data directory available for logs")]
    NoDataDir,
    /// Failed to create or access the log directory.
    #[error("Failed to prepare log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to enumerate existing log files.
    #[error("Failed to read log directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to remove an obsolete log file.
    #[error("Failed to remove old log file {path}: {source}")]
    RemoveFile {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to format the date for the log filename.
    #[error("Failed to format log filename date: {0}")]
    FormatTime(time::error::Format),
    /// Failed to set the global tracing subscriber.
    #[error("Failed to install global tracing subscriber: {0}")]
    SetGlobal(tracing::subscriber::SetGlobalDefaultError),
    /// Failed to create the log file for this session.
    #[error("Failed to create log file at {path}: {source}")]
    CreateLogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Initialize tracing for this session and return the session log path.
///
/// Subsequent calls are no-ops and return `None`. Failures are returned so
/// callers can continue without file logging.
pub fn init() -> Result<Option<PathBuf>, LoggingError> {
    if LOG_GUARD.get().is_some() {
        return Ok(None);
    }

    let log_dir = log_directory()?;
    let date = format_log_date(now_local_or_utc())?;
    let (session, log_file_name) = create_session_log(&log_dir, &date)?;
    let log_path = log_dir.join(&log_file_name);
    prune_old_logs(&log_dir, MAX_LOG_FILES, &log_path)?;

    let file_appender = rolling::never(&log_dir, log_file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let timer = build_timer();
    let stderr_layer = fmt::layer()
        .with_timer(timer.clone())
        .with_writer(std::io::stderr)
        .with_filter(LevelFilter::WARN);
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(file_writer);

    let subscriber = Registry::default()
        .with(build_env_filter())
        .with(stderr_layer)
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber).map_err(LoggingError::SetGlobal)?;
    let _ = LOG_GUARD.set(guard);

    tracing::info!("=== Session {session} started; log file at {} ===", log_path.display());
    Ok(Some(log_path))
}

fn log_directory() -> Result<PathBuf, LoggingError> {
    app_dirs::logs_dir().map_err(map_app_dir_error)
}

/// Claim a fresh session log for `date`, never reusing an existing name.
fn create_session_log(dir: &Path, date: &str) -> Result<(u32, String), LoggingError> {
    let mut session = next_session_number(dir, date)?;
    loop {
        let name = format_log_file_name(date, session);
        let path = dir.join(&name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => return Ok((session, name)),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists && session < u32::MAX => {
                session += 1;
            }
            Err(source) => return Err(LoggingError::CreateLogFile { path, source }),
        }
    }
}

/// One past the highest session number already used today.
fn next_session_number(dir: &Path, date: &str) -> Result<u32, LoggingError> {
    let prefix = format!("{LOG_FILE_PREFIX}_{date}_session-");
    let highest = read_log_dir(dir)?
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.strip_prefix(&prefix)?
                .strip_suffix(".log")?
                .parse::<u32>()
                .ok()
        })
        .max()
        .unwrap_or(0);
    Ok(highest.saturating_add(1))
}

/// Delete the oldest `ressys_*.log` files beyond `max_files`; `current` is always kept.
fn prune_old_logs(dir: &Path, max_files: usize, current: &Path) -> Result<(), LoggingError> {
    let prefix = format!("{LOG_FILE_PREFIX}_");
    let mut entries = read_log_dir(dir)?
        .filter(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            name.starts_with(&prefix) && name.ends_with(".log") && entry.path() != current
        })
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect::<Vec<_>>();

    entries.sort_by_key(|(modified, _)| *modified);
    let excess = entries.len().saturating_sub(max_files.saturating_sub(1));
    for (_, path) in entries.iter().take(excess) {
        fs::remove_file(path).map_err(|source| LoggingError::RemoveFile {
            path: path.to_path_buf(),
            source,
        })?;
    }
    Ok(())
}

/// Regular files in the log directory.
fn read_log_dir(dir: &Path) -> Result<impl Iterator<Item = fs::DirEntry>, LoggingError> {
    let entries = fs::read_dir(dir).map_err(|source| LoggingError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false)))
}

fn format_log_date(now: OffsetDateTime) -> Result<String, LoggingError> {
    const DATE_FORMAT: &[FormatItem<'_>] = format_description!("[year]-[month]-[day]");
    now.format(DATE_FORMAT).map_err(LoggingError::FormatTime)
}

fn format_log_file_name(date: &str, session: u32) -> String {
    format!("{LOG_FILE_PREFIX}_{date}_session-{session}.log")
}

fn build_timer() -> fmt::time::OffsetTime<time::format_description::BorrowedFormatItem<'static>> {
    const DISPLAY_FORMAT: &[FormatItem<'static>] = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"
    );
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    fmt::time::OffsetTime::new(offset, DISPLAY_FORMAT.into())
}

fn now_local_or_utc() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

fn build_env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

fn map_app_dir_error(error: app_dirs::AppDirError) -> LoggingError {
    match error {
        app_dirs::AppDirError::NoBaseDir => LoggingError::NoDataDir,
        app_dirs::AppDirError::CreateDir { path, source } => {
            LoggingError::CreateDir { path, source }
        }
    }
}
