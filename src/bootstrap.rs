//! Bootstrap configuration read at launch.
//!
//! The file is TOML grouped by section, for example:
//!
//! ```toml
//! [paths]
//! python_path = "python/python.exe"
//! server_script = "python_server/main.py"
//! output_file = "output/prediction.txt"
//!
//! [server]
//! port = 8000
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;

use crate::app_dirs::{self, AppDirError};
use crate::service::supervisor::DEFAULT_SOFT_STOP_GRACE;
use crate::service::{ReadinessPolicy, RpcTimeouts, ServiceAddress, ServiceCommand};

/// Default filename looked up next to the executable.
pub const CONFIG_FILE_NAME: &str = "app_config.toml";
/// Default output file, relative to the config directory.
const DEFAULT_OUTPUT_FILE: &str = "output/prediction.txt";

/// Errors that may occur while loading or resolving the bootstrap config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// The file is not valid TOML.
    #[error("Invalid config at {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// A required key is absent or empty.
    #[error("Missing [{section}] {key} in bootstrap config")]
    MissingKey {
        section: &'static str,
        key: &'static str,
    },
    /// A value is present but out of range.
    #[error("Invalid [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        reason: String,
    },
    /// The app data directory could not be prepared.
    #[error(transparent)]
    AppDir(#[from] AppDirError),
}

/// Settings resolved from the bootstrap file, ready for use.
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// Service interpreter, absolute.
    pub interpreter: PathBuf,
    /// Service entry point, absolute.
    pub entry_point: PathBuf,
    /// Where prediction results are written.
    pub output_file: PathBuf,
    /// Learning-base store root.
    pub data_root: PathBuf,
    pub address: ServiceAddress,
    pub timeouts: RpcTimeouts,
    pub readiness: ReadinessPolicy,
    pub soft_stop_grace: Duration,
}

impl AppSettings {
    /// Command that launches the service, logging its output to `output_log`.
    pub fn service_command(&self, output_log: Option<PathBuf>) -> ServiceCommand {
        ServiceCommand {
            interpreter: self.interpreter.clone(),
            entry_point: self.entry_point.clone(),
            output_log,
        }
    }
}

/// Raw sectioned key/value pairs loaded from disk.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    base_dir: PathBuf,
    table: toml::Table,
}

impl BootstrapConfig {
    /// Default location: beside the running executable.
    pub fn default_path() -> PathBuf {
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_FILE_NAME)
    }

    /// Load and parse `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base_dir).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse TOML text; relative paths will resolve against `base_dir`.
    pub fn parse(text: &str, base_dir: &Path) -> Result<Self, toml::de::Error> {
        Ok(Self {
            base_dir: base_dir.to_path_buf(),
            table: text.parse::<toml::Table>()?,
        })
    }

    fn value(&self, section: &str, key: &str) -> Option<&toml::Value> {
        self.table
            .get(section)
            .and_then(toml::Value::as_table)
            .and_then(|table| table.get(key))
    }

    /// String value of `[section] key`, or `default` when absent.
    ///
    /// Non-string scalars are rendered as text.
    pub fn get_string(&self, section: &str, key: &str, default: &str) -> String {
        match self.value(section, key) {
            Some(toml::Value::String(value)) => value.trim().to_string(),
            Some(other) => other.to_string(),
            None => default.to_string(),
        }
    }

    /// Integer value of `[section] key`, or `default` when absent or unparseable.
    ///
    /// Quoted integers such as `"8000"` are accepted.
    pub fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        match self.value(section, key) {
            Some(toml::Value::Integer(value)) => *value,
            Some(toml::Value::String(value)) => value.trim().parse().unwrap_or(default),
            _ => default,
        }
    }

    /// Platform app-data directory (`%APPDATA%\ResSysApp` on Windows).
    pub fn app_data_dir(&self) -> Result<PathBuf, ConfigError> {
        Ok(app_dirs::app_data_dir()?)
    }

    /// Resolve every setting, applying defaults and making paths absolute.
    pub fn resolve(&self) -> Result<AppSettings, ConfigError> {
        let interpreter = self.required_path("paths", "python_path")?;
        let entry_point = self.required_path("paths", "server_script")?;
        let output_file =
            self.path_or(&self.get_string("paths", "output_file", DEFAULT_OUTPUT_FILE));
        let data_root = match self.get_string("paths", "data_root", "") {
            root if root.is_empty() => app_dirs::default_data_root()?,
            root => self.path_or(&root),
        };

        let defaults = ServiceAddress::default();
        let port = self.get_int("server", "port", i64::from(defaults.port));
        let port = u16::try_from(port).map_err(|_| ConfigError::InvalidValue {
            section: "server",
            key: "port",
            reason: format!("{port} is not a valid TCP port"),
        })?;
        let address = ServiceAddress {
            host: self.get_string("server", "host", &defaults.host),
            port,
        };

        let default_timeouts = RpcTimeouts::default();
        let timeouts = RpcTimeouts {
            request: self.millis("server", "timeout_ms", default_timeouts.request)?,
            shutdown: self.millis("server", "shutdown_timeout_ms", default_timeouts.shutdown)?,
        };

        let default_policy = ReadinessPolicy::default();
        let attempts = self.get_int("startup", "attempts", i64::from(default_policy.attempts));
        let readiness = ReadinessPolicy {
            warmup: self.millis("startup", "warmup_ms", default_policy.warmup)?,
            attempts: u32::try_from(attempts)
                .ok()
                .filter(|attempts| *attempts > 0)
                .ok_or_else(|| ConfigError::InvalidValue {
                    section: "startup",
                    key: "attempts",
                    reason: format!("{attempts} must be a positive number"),
                })?,
            delay: self.millis("startup", "delay_ms", default_policy.delay)?,
        };
        let soft_stop_grace =
            self.millis("startup", "soft_stop_grace_ms", DEFAULT_SOFT_STOP_GRACE)?;

        Ok(AppSettings {
            interpreter,
            entry_point,
            output_file,
            data_root,
            address,
            timeouts,
            readiness,
            soft_stop_grace,
        })
    }

    fn required_path(
        &self,
        section: &'static str,
        key: &'static str,
    ) -> Result<PathBuf, ConfigError> {
        let value = self.get_string(section, key, "");
        if value.is_empty() {
            return Err(ConfigError::MissingKey { section, key });
        }
        Ok(self.path_or(&value))
    }

    fn path_or(&self, value: &str) -> PathBuf {
        let path = PathBuf::from(value);
        if path.is_absolute() {
            path
        } else {
            self.base_dir.join(path)
        }
    }

    fn millis(
        &self,
        section: &'static str,
        key: &'static str,
        default: Duration,
    ) -> Result<Duration, ConfigError> {
        let default_ms = i64::try_from(default.as_millis()).unwrap_or(i64::MAX);
        let value = self.get_int(section, key, default_ms);
        u64::try_from(value)
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::InvalidValue {
                section,
                key,
                reason: format!("{value} is negative"),
            })
    }
}
