//! Application directory helpers anchored to a single `ResSysApp` folder.
//!
//! Logs and the default learning-base store live under the OS config directory
//! (`%APPDATA%` on Windows), with a `RESSYS_DATA_HOME` override for tests or
//! portable setups.

use std::{
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex},
};

use directories::BaseDirs;
use thiserror::Error;

/// Name of the application directory that lives under the OS config root.
pub const APP_DIR_NAME: &str = "ResSysApp";
/// Environment variable that replaces the OS config root.
pub const DATA_HOME_ENV: &str = "RESSYS_DATA_HOME";

static DATA_BASE_OVERRIDE: LazyLock<Mutex<Option<PathBuf>>> = LazyLock::new(|| Mutex::new(None));

/// Errors that can occur while resolving or preparing application directories.
#[derive(Debug, Error)]
pub enum AppDirError {
    /// No suitable base config directory could be resolved.
    #[error("No suitable base directory available for application data")]
    NoBaseDir,
    /// Failed to create the application directory.
    #[error("Failed to create application directory at {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Return the root `ResSysApp` directory, creating it if needed.
pub fn app_data_dir() -> Result<PathBuf, AppDirError> {
    let base = data_base_dir().ok_or(AppDirError::NoBaseDir)?;
    ensure_dir(base.join(APP_DIR_NAME))
}

/// Return the logs directory inside the app root, creating it if needed.
pub fn logs_dir() -> Result<PathBuf, AppDirError> {
    ensure_dir(app_data_dir()?.join("logs"))
}

/// Default learning-base store root used when the bootstrap config names none.
///
/// The directory is not created here; the store creates it on first upload.
pub fn default_data_root() -> Result<PathBuf, AppDirError> {
    Ok(app_data_dir()?.join("data").join("LearningBases"))
}

fn ensure_dir(path: PathBuf) -> Result<PathBuf, AppDirError> {
    std::fs::create_dir_all(&path).map_err(|source| AppDirError::CreateDir {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

fn data_base_dir() -> Option<PathBuf> {
    if let Some(path) = data_base_override() {
        return Some(path);
    }
    if let Ok(path) = std::env::var(DATA_HOME_ENV) {
        return Some(PathBuf::from(path));
    }
    BaseDirs::new().map(|dirs| dirs.config_dir().to_path_buf())
}

/// Pin the data base directory for the rest of the process.
///
/// Used by the `--data-home` command-line flag.
pub fn set_data_base_override(path: &Path) {
    if let Ok(mut guard) = DATA_BASE_OVERRIDE.lock() {
        *guard = Some(path.to_path_buf());
    }
}

/// Directory pinned by [`set_data_base_override`], if any.
pub fn data_base_override() -> Option<PathBuf> {
    DATA_BASE_OVERRIDE
        .lock()
        .ok()
        .and_then(|guard| guard.clone())
}

/// Drop the pin so the environment variable or OS default applies again.
pub fn clear_data_base_override() {
    if let Ok(mut guard) = DATA_BASE_OVERRIDE.lock() {
        *guard = None;
    }
}
