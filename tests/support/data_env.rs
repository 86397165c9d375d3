//! Scoped control over where `app_dirs` anchors the `ResSysApp` folder.

use std::{
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, OnceLock},
};

use ressys::app_dirs::{self, DATA_HOME_ENV};

static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

/// Points the data home at a test directory.
///
/// Both `RESSYS_DATA_HOME` and any `--data-home` pin are restored on drop.
pub struct DataHomeGuard {
    previous_env: Option<String>,
    previous_pin: Option<PathBuf>,
    _lock: MutexGuard<'static, ()>,
}

impl DataHomeGuard {
    /// Route through the environment variable with no pin in effect.
    pub fn env(path: PathBuf) -> Self {
        let lock = ENV_LOCK
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        let guard = Self {
            previous_env: std::env::var(DATA_HOME_ENV).ok(),
            previous_pin: app_dirs::data_base_override(),
            _lock: lock,
        };
        app_dirs::clear_data_base_override();
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            std::env::set_var(DATA_HOME_ENV, path);
        }
        guard
    }

    /// Pin the data home as `--data-home` does, outranking the variable.
    pub fn pin(&self, path: &Path) {
        app_dirs::set_data_base_override(path);
    }
}

impl Drop for DataHomeGuard {
    fn drop(&mut self) {
        match self.previous_pin.take() {
            Some(path) => app_dirs::set_data_base_override(&path),
            None => app_dirs::clear_data_base_override(),
        }
        // SAFETY: tests run under a global lock to prevent concurrent env mutations.
        unsafe {
            match self.previous_env.take() {
                Some(value) => std::env::set_var(DATA_HOME_ENV, value),
                None => std::env::remove_var(DATA_HOME_ENV),
            }
        }
    }
}
