use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const PRIMARY_CONFIG_PATH: &str = "/etc/facegate/config.toml";
pub const SECONDARY_CONFIG_PATH: &str = "/usr/local/etc/facegate/config.toml";
pub const CONFIG_PATH_ENV: &str = "FACEGATE_CONFIG";
pub const STORE_PATH_ENV: &str = "FACEGATE_STORE_PATH";
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.55;
pub const DEFAULT_STORE_PATH: &str = "/var/lib/facegate/enrollments.json";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub similarity_threshold: Option<f64>,
    pub store_path: Option<PathBuf>,
    pub embedding_dimension: Option<usize>,
    pub store_key_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub similarity_threshold: f64,
    pub store_path: PathBuf,
    pub embedding_dimension: Option<usize>,
    pub store_key_file: Option<PathBuf>,
}

impl ResolvedConfig {
    pub fn from_raw(raw: ConfigFile) -> Self {
        Self {
            similarity_threshold: raw
                .similarity_threshold
                .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
            store_path: raw
                .store_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_PATH)),
            embedding_dimension: raw.embedding_dimension.filter(|dim| *dim > 0),
            store_key_file: raw.store_key_file,
        }
    }

    /// Applies `$FACEGATE_STORE_PATH` on top of the file value.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(path) = env::var_os(STORE_PATH_ENV).filter(|value| !value.is_empty()) {
            self.store_path = PathBuf::from(path);
        }
        self
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self::from_raw(ConfigFile::default())
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub contents: ConfigFile,
    pub source: PathBuf,
}

impl LoadedConfig {
    pub fn new(contents: ConfigFile, source: PathBuf) -> Self {
        Self { contents, source }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfigWithSource {
    pub resolved: ResolvedConfig,
    pub source: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Candidate files in lookup order: `$FACEGATE_CONFIG` alone when set,
/// otherwise the system paths.
pub fn default_config_paths() -> Vec<PathBuf> {
    match env::var_os(CONFIG_PATH_ENV).filter(|value| !value.is_empty()) {
        Some(path) => vec![PathBuf::from(path)],
        None => vec![
            PathBuf::from(PRIMARY_CONFIG_PATH),
            PathBuf::from(SECONDARY_CONFIG_PATH),
        ],
    }
}

pub fn load_resolved_config() -> Result<ResolvedConfigWithSource, ConfigError> {
    let mut loaded = load_resolved_from_paths(&default_config_paths())?;
    loaded.resolved = loaded.resolved.with_env_overrides();
    Ok(loaded)
}

pub fn load_from_paths(paths: &[PathBuf]) -> Result<Option<LoadedConfig>, ConfigError> {
    for path in paths {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let parsed =
                    toml::from_str::<ConfigFile>(&contents).map_err(|err| ConfigError::Parse {
                        path: path.clone(),
                        message: err.to_string(),
                    })?;
                return Ok(Some(LoadedConfig::new(parsed, path.clone())));
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(ConfigError::Read {
                    path: path.clone(),
                    source: err,
                })
            }
        }
    }

    Ok(None)
}

pub fn load_resolved_from_paths(
    paths: &[PathBuf],
) -> Result<ResolvedConfigWithSource, ConfigError> {
    match load_from_paths(paths)? {
        Some(entry) => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::from_raw(entry.contents),
            source: Some(entry.source),
        }),
        None => Ok(ResolvedConfigWithSource {
            resolved: ResolvedConfig::default(),
            source: None,
        }),
    }
}
