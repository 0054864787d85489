use std::path::PathBuf;

use chrono::{DateTime, Utc};
use facegate_core::faces::{validate_threshold, IdentitySummary, VerificationResult};
use serde::Serialize;

use crate::cli::{EnrollArgs, RemoveArgs, StoreArgs, VerifyArgs};
use crate::config::{self, EngineSettings};
use crate::errors::AppResult;
use crate::input::load_embedding;

#[derive(Debug, Clone, Serialize)]
pub struct EnrollSummary {
    pub identity_id: String,
    pub display_name: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
    pub store_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct EnrollOutcome {
    pub summary: EnrollSummary,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub result: VerificationResult,
    pub logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListOutcome {
    pub store_path: PathBuf,
    pub identities: Vec<IdentitySummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoveOutcome {
    pub store_path: PathBuf,
    pub identity_id: String,
    pub removed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearOutcome {
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusOutcome {
    pub store_path: PathBuf,
    pub sealed: bool,
    pub config_source: Option<PathBuf>,
    pub similarity_threshold: f64,
    pub enrolled: usize,
    pub dimension: Option<usize>,
    pub identities: Vec<IdentitySummary>,
}

pub fn run_enroll(args: &EnrollArgs) -> AppResult<EnrollOutcome> {
    let settings = config::load_engine_settings(args.store.store.clone())?;
    run_enroll_with(args, &settings)
}

pub fn run_enroll_with(args: &EnrollArgs, settings: &EngineSettings) -> AppResult<EnrollOutcome> {
    let embedding = load_embedding(&args.embedding)?;
    let mut logs = vec![format!(
        "Loaded {}-dimensional embedding from {}",
        embedding.dimension(),
        args.embedding.display()
    )];

    let record = settings
        .open_engine()
        .enroll(&args.identity_id, &args.display_name, &embedding)?;
    logs.push(format!(
        "Stored template for '{}' in {}",
        record.identity_id,
        settings.store_path.display()
    ));

    Ok(EnrollOutcome {
        summary: EnrollSummary {
            identity_id: record.identity_id,
            display_name: record.display_name,
            dimension: record.embedding.dimension(),
            created_at: record.created_at,
            store_path: settings.store_path.clone(),
        },
        logs,
    })
}

pub fn run_verify(args: &VerifyArgs) -> AppResult<VerifyOutcome> {
    let settings = config::load_engine_settings(args.store.store.clone())?;
    run_verify_with(args, &settings)
}

pub fn run_verify_with(args: &VerifyArgs, settings: &EngineSettings) -> AppResult<VerifyOutcome> {
    let threshold = match args.threshold {
        Some(value) => value,
        None => {
            tracing::info!(
                target: "verify.defaults",
                "No --threshold flag; using similarity_threshold {}",
                settings.threshold
            );
            settings.threshold
        }
    };

    let embedding = load_embedding(&args.embedding)?;
    let result = settings.open_engine().verify(&embedding, threshold)?;
    let logs = vec![
        format!(
            "Compared {}-dimensional probe against {}",
            embedding.dimension(),
            settings.store_path.display()
        ),
        format!("Best score {:.4} (threshold {:.4})", result.score, result.threshold),
    ];
    Ok(VerifyOutcome { result, logs })
}

pub fn run_list(args: &StoreArgs) -> AppResult<ListOutcome> {
    let settings = config::load_engine_settings(args.store.clone())?;
    run_list_with(&settings)
}

pub fn run_list_with(settings: &EngineSettings) -> AppResult<ListOutcome> {
    Ok(ListOutcome {
        store_path: settings.store_path.clone(),
        identities: settings.open_engine().list()?,
    })
}

pub fn run_remove(args: &RemoveArgs) -> AppResult<RemoveOutcome> {
    let settings = config::load_engine_settings(args.store.store.clone())?;
    run_remove_with(args, &settings)
}

pub fn run_remove_with(args: &RemoveArgs, settings: &EngineSettings) -> AppResult<RemoveOutcome> {
    let removed = settings.open_engine().remove(&args.identity_id)?;
    Ok(RemoveOutcome {
        store_path: settings.store_path.clone(),
        identity_id: args.identity_id.clone(),
        removed,
    })
}

pub fn run_clear(args: &StoreArgs) -> AppResult<ClearOutcome> {
    let settings = config::load_engine_settings(args.store.clone())?;
    run_clear_with(&settings)
}

pub fn run_clear_with(settings: &EngineSettings) -> AppResult<ClearOutcome> {
    settings.open_engine().clear()?;
    Ok(ClearOutcome {
        store_path: settings.store_path.clone(),
    })
}

pub fn run_status(args: &StoreArgs) -> AppResult<StatusOutcome> {
    let settings = config::load_engine_settings(args.store.clone())?;
    run_status_with(&settings)
}

pub fn run_status_with(settings: &EngineSettings) -> AppResult<StatusOutcome> {
    validate_threshold(settings.threshold)?;
    let engine = settings.open_engine();
    let status = engine.status()?;
    let backend = engine.store().backend();
    Ok(StatusOutcome {
        store_path: backend.path().to_path_buf(),
        sealed: backend.is_sealed(),
        config_source: settings.config_source.clone(),
        similarity_threshold: settings.threshold,
        enrolled: status.enrolled,
        dimension: status.dimension,
        identities: status.identities,
    })
}
