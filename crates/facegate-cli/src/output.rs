use std::error::Error;
use std::io::{self, Write};

use serde::Serialize;
use serde_json::{json, Value};

use crate::cli::OutputMode;
use crate::errors::{AppError, AppResult};
use crate::identities::{
    ClearOutcome, EnrollOutcome, ListOutcome, RemoveOutcome, StatusOutcome, VerifyOutcome,
};

fn write_json<T: Serialize + ?Sized>(payload: &T) -> AppResult<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let payload = serde_json::to_string(payload)?;
    handle.write_all(payload.as_bytes())?;
    handle.write_all(b"\n")?;
    Ok(())
}

pub fn render_enroll(outcome: &EnrollOutcome, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if verbose {
                for line in &outcome.logs {
                    tracing::info!("{line}");
                }
            }
            println!(
                "Enrolled '{}' ({}) with a {}-dimensional template",
                outcome.summary.identity_id,
                outcome.summary.display_name,
                outcome.summary.dimension
            );
        }
        OutputMode::Json => write_json(&outcome.summary)?,
    }
    Ok(())
}

pub fn render_verify(outcome: &VerifyOutcome, mode: OutputMode, verbose: bool) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if verbose {
                for line in &outcome.logs {
                    tracing::info!("{line}");
                }
            }
            let result = &outcome.result;
            match (&result.identity_id, &result.display_name) {
                (Some(id), Some(name)) if result.verified => println!(
                    "Verified as '{id}' ({name}): score {:.4}, confidence {:.4}",
                    result.score, result.confidence
                ),
                _ => println!(
                    "Not verified: best score {:.4} does not exceed threshold {:.4}",
                    result.score, result.threshold
                ),
            }
        }
        OutputMode::Json => write_json(&outcome.result)?,
    }
    Ok(())
}

pub fn render_list(outcome: &ListOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if outcome.identities.is_empty() {
                println!("No identities enrolled in {}", outcome.store_path.display());
            }
            for identity in &outcome.identities {
                println!("{}\t{}", identity.identity_id, identity.display_name);
            }
        }
        OutputMode::Json => write_json(&outcome.identities)?,
    }
    Ok(())
}

pub fn render_remove(outcome: &RemoveOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            if outcome.removed {
                println!("Removed '{}'", outcome.identity_id);
            } else {
                println!("No identity '{}' was enrolled", outcome.identity_id);
            }
        }
        OutputMode::Json => write_json(outcome)?,
    }
    Ok(())
}

pub fn render_clear(outcome: &ClearOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => println!(
            "Cleared all enrollments from {}",
            outcome.store_path.display()
        ),
        OutputMode::Json => write_json(&json!({
            "cleared": true,
            "store_path": outcome.store_path.display().to_string(),
        }))?,
    }
    Ok(())
}

pub fn render_status(outcome: &StatusOutcome, mode: OutputMode) -> AppResult<()> {
    match mode {
        OutputMode::Human => {
            println!(
                "Store: {}{}",
                outcome.store_path.display(),
                if outcome.sealed { " (sealed)" } else { "" }
            );
            match &outcome.config_source {
                Some(path) => println!("Config: {}", path.display()),
                None => println!("Config: defaults"),
            }
            println!("Similarity threshold: {}", outcome.similarity_threshold);
            match outcome.dimension {
                Some(dimension) => println!("Enrolled: {} ({dimension}-d)", outcome.enrolled),
                None => println!("Enrolled: {}", outcome.enrolled),
            }
        }
        OutputMode::Json => write_json(&status_json_payload(outcome))?,
    }
    Ok(())
}

fn status_json_payload(outcome: &StatusOutcome) -> Value {
    json!({
        "store_path": outcome.store_path.display().to_string(),
        "sealed": outcome.sealed,
        "config_source": outcome.config_source.as_ref().map(|path| path.display().to_string()),
        "similarity_threshold": outcome.similarity_threshold,
        "enrolled": outcome.enrolled,
        "dimension": outcome.dimension,
        "identities": outcome.identities,
    })
}

pub fn render_error(err: &AppError, mode: OutputMode) {
    match mode {
        OutputMode::Human => {
            eprintln!("error: {}", err.human_message());
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
        OutputMode::Json => {
            let payload = json!({
                "success": false,
                "error": err.human_message(),
            });
            if let Ok(json) = serde_json::to_string(&payload) {
                println!("{json}");
            }
            if let Some(source) = err.source() {
                eprintln!("cause: {source}");
            }
        }
    }
}
