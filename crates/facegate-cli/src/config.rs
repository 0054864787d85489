use std::path::PathBuf;

use facegate_config::{self as config, ResolvedConfigWithSource};
use facegate_core::faces::{EngineOptions, FaceEngine, StoreKey};

use crate::errors::{from_config_error, AppResult};

/// Everything a command needs to open the engine, after flags, environment
/// and config files have been merged.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub store_path: PathBuf,
    pub threshold: f64,
    pub dimension: Option<usize>,
    pub store_key: Option<StoreKey>,
    pub config_source: Option<PathBuf>,
}

impl EngineSettings {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            store_path: self.store_path.clone(),
            store_key: self.store_key.clone(),
            dimension: self.dimension,
        }
    }

    pub fn open_engine(&self) -> FaceEngine {
        FaceEngine::open(self.engine_options())
    }
}

pub fn load_engine_settings(store_override: Option<PathBuf>) -> AppResult<EngineSettings> {
    let loaded = config::load_resolved_config().map_err(from_config_error)?;
    settings_from(loaded, store_override)
}

pub fn load_engine_settings_with_sources(
    store_override: Option<PathBuf>,
    sources: &[PathBuf],
) -> AppResult<EngineSettings> {
    let loaded = config::load_resolved_from_paths(sources).map_err(from_config_error)?;
    settings_from(loaded, store_override)
}

fn settings_from(
    loaded: ResolvedConfigWithSource,
    store_override: Option<PathBuf>,
) -> AppResult<EngineSettings> {
    let resolved = loaded.resolved;
    if loaded.source.is_none() {
        tracing::debug!(
            target: "config.defaults",
            "No config file found; using similarity_threshold {} and store {}",
            resolved.similarity_threshold,
            resolved.store_path.display()
        );
    }

    let store_key = match resolved.store_key_file.as_deref() {
        Some(path) => Some(StoreKey::read_from(path)?),
        None => None,
    };

    Ok(EngineSettings {
        store_path: store_override.unwrap_or(resolved.store_path),
        threshold: resolved.similarity_threshold,
        dimension: resolved.embedding_dimension,
        store_key,
        config_source: loaded.source,
    })
}
