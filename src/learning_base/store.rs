//! On-disk learning-base store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<name>.dat           copy of the uploaded dataset
//! <root>/Configs/<name>.txt   key=value description of the base
//! ```
//!
//! Each artifact is staged in a temporary file beside its destination and
//! renamed into place, so readers never observe a half-written file. The two
//! artifacts are written independently: if the config write fails after the
//! dataset copy succeeded, the new dataset stays next to the previous config.

use std::{
    collections::HashMap,
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use thiserror::Error;
use tracing::{debug, info};

use super::{LearningBaseConfig, ParseError};

/// Extension marking dataset artifacts in the store root.
pub const DATASET_EXTENSION: &str = "dat";
/// Directory holding serialized configurations.
pub const CONFIGS_DIR: &str = "Configs";
const CONFIG_EXTENSION: &str = "txt";
const STAGING_PREFIX: &str = ".ressys-";
const STAGING_SUFFIX: &str = ".part";

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The base name cannot be used as a single file name.
    #[error("Invalid learning base name '{name}'")]
    InvalidName { name: String },
    /// The file to upload does not exist.
    #[error("Source file not found: {path}")]
    MissingSource { path: PathBuf },
    /// Failed to create a store directory.
    #[error("Unable to create store directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    /// Failed to copy the dataset into the store.
    #[error("Failed to copy {from} to {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    /// Failed to write a store artifact.
    #[error("Failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    /// Failed to read a store artifact or directory.
    #[error("Failed to read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    /// A stored config file could not be interpreted.
    #[error("Malformed learning base config {path}: {reason}")]
    MalformedConfig { path: PathBuf, reason: String },
}

/// Paths of one stored learning base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBasePaths {
    /// Dataset artifact, `<root>/<name>.dat`.
    pub artifact: PathBuf,
    /// Serialized configuration, `<root>/Configs/<name>.txt`.
    pub config: PathBuf,
}

/// Learning-base store rooted at a single directory.
#[derive(Debug, Clone)]
pub struct LearningBaseStore {
    root: PathBuf,
}

impl LearningBaseStore {
    /// Create a store handle; nothing is touched on disk until an upload.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Compute where `name` is stored. No existence check is made.
    pub fn resolve(&self, name: &str) -> StoredBasePaths {
        StoredBasePaths {
            artifact: self.root.join(format!("{name}.{DATASET_EXTENSION}")),
            config: self
                .root
                .join(CONFIGS_DIR)
                .join(format!("{name}.{CONFIG_EXTENSION}")),
        }
    }

    /// Copy `source` into the store and write the config for `config.name()`.
    ///
    /// Existing artifacts with the same name are replaced.
    pub fn upload(
        &self,
        source: &Path,
        config: &LearningBaseConfig,
    ) -> Result<StoredBasePaths, StoreError> {
        validate_name(config.name())?;
        if !source.is_file() {
            return Err(StoreError::MissingSource {
                path: source.to_path_buf(),
            });
        }
        let paths = self.resolve(config.name());

        ensure_dir(&self.root)?;
        copy_staged(source, &paths.artifact)?;
        debug!(
            "Copied dataset {} to {}",
            source.display(),
            paths.artifact.display()
        );

        let configs_dir = self.root.join(CONFIGS_DIR);
        ensure_dir(&configs_dir)?;
        write_staged(&paths.config, render_config(config).as_bytes())?;

        info!(
            "Stored learning base '{}' ({} samples, {} targets, {} features)",
            config.name(),
            config.sample_count(),
            config.target_count(),
            config.feature_count()
        );
        Ok(paths)
    }

    /// Names of stored bases, in directory enumeration order.
    ///
    /// A missing store root yields an empty list.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.root.clone(),
                    source,
                });
            }
        };
        let names = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|ft| ft.is_file()).unwrap_or(false))
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().and_then(|ext| ext.to_str()) == Some(DATASET_EXTENSION)
            })
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            })
            .collect();
        Ok(names)
    }

    /// Read back the stored configuration for `name`.
    pub fn read_config(&self, name: &str) -> Result<LearningBaseConfig, StoreError> {
        validate_name(name)?;
        let path = self.resolve(name).config;
        let text = fs::read_to_string(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        parse_config_text(&text).map_err(|reason| StoreError::MalformedConfig { path, reason })
    }
}

fn validate_name(name: &str) -> Result<(), StoreError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.starts_with(STAGING_PREFIX);
    if invalid {
        return Err(StoreError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(path).map_err(|source| StoreError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

fn staging_file(dest: &Path) -> Result<tempfile::NamedTempFile, StoreError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(dir)
        .map_err(|source| StoreError::Write {
            path: dest.to_path_buf(),
            source,
        })
}

fn copy_staged(source: &Path, dest: &Path) -> Result<(), StoreError> {
    let copy_err = |source_err: io::Error| StoreError::Copy {
        from: source.to_path_buf(),
        to: dest.to_path_buf(),
        source: source_err,
    };
    let mut input = File::open(source).map_err(copy_err)?;
    let mut staged = staging_file(dest)?;
    io::copy(&mut input, staged.as_file_mut()).map_err(copy_err)?;
    staged.as_file().sync_all().map_err(copy_err)?;
    staged.persist(dest).map_err(|err| copy_err(err.error))?;
    Ok(())
}

fn write_staged(dest: &Path, data: &[u8]) -> Result<(), StoreError> {
    let write_err = |source: io::Error| StoreError::Write {
        path: dest.to_path_buf(),
        source,
    };
    let mut staged = staging_file(dest)?;
    staged.write_all(data).map_err(write_err)?;
    staged.as_file().sync_all().map_err(write_err)?;
    staged.persist(dest).map_err(|err| write_err(err.error))?;
    Ok(())
}

/// Serialize a config as `key=value` lines; sequences are comma-joined.
pub fn render_config(config: &LearningBaseConfig) -> String {
    format!(
        "name={}\nnum_samples={}\nnum_targets_y={}\ny_precision={}\nnum_features_x={}\nx_lengths={}\n",
        config.name(),
        config.sample_count(),
        config.target_count(),
        join(config.target_precision()),
        config.feature_count(),
        join(config.feature_lengths()),
    )
}

fn join<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse text written by [`render_config`].
pub fn parse_config_text(text: &str) -> Result<LearningBaseConfig, String> {
    let mut fields: HashMap<&str, &str> = HashMap::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| format!("line without '=': '{line}'"))?;
        fields.insert(key.trim(), value);
    }
    let field = |key: &str| {
        fields
            .get(key)
            .copied()
            .ok_or_else(|| format!("missing key '{key}'"))
    };

    let name = field("name")?;
    let sample_count = parse_scalar::<u64>("num_samples", field("num_samples")?)?;
    let target_count = parse_scalar::<usize>("num_targets_y", field("num_targets_y")?)?;
    let target_precision = parse_list::<f64>("y_precision", field("y_precision")?)?;
    let feature_count = parse_scalar::<usize>("num_features_x", field("num_features_x")?)?;
    let feature_lengths = parse_list::<u64>("x_lengths", field("x_lengths")?)?;

    if target_precision.len() != target_count {
        return Err(format!(
            "num_targets_y is {target_count} but y_precision has {} values",
            target_precision.len()
        ));
    }
    if feature_lengths.len() != feature_count {
        return Err(format!(
            "num_features_x is {feature_count} but x_lengths has {} values",
            feature_lengths.len()
        ));
    }
    LearningBaseConfig::new(name, sample_count, target_precision, feature_lengths)
        .map_err(|err: ParseError| err.to_string())
}

fn parse_scalar<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value for '{key}': '{value}'"))
}

fn parse_list<T: std::str::FromStr>(key: &str, value: &str) -> Result<Vec<T>, String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split(',')
        .map(|item| parse_scalar(key, item))
        .collect()
}
