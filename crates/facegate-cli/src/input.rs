use std::fs;
use std::path::Path;

use facegate_core::faces::EmbeddingVector;
use serde::Deserialize;

use crate::errors::{AppError, AppResult};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingPayload {
    Bare(Vec<f64>),
    Wrapped { embedding: Vec<f64> },
}

/// Reads an embedding from a JSON file holding either a number array or an
/// object with an `embedding` array.
pub fn load_embedding(path: &Path) -> AppResult<EmbeddingVector> {
    let contents = fs::read_to_string(path).map_err(|source| AppError::InputRead {
        path: path.to_path_buf(),
        source,
    })?;
    parse_embedding(path, &contents)
}

pub fn parse_embedding(path: &Path, contents: &str) -> AppResult<EmbeddingVector> {
    let payload: EmbeddingPayload =
        serde_json::from_str(contents).map_err(|_| AppError::InvalidInput {
            path: path.to_path_buf(),
            message: "expected a JSON array of numbers or an object with an \"embedding\" array"
                .into(),
        })?;
    let values = match payload {
        EmbeddingPayload::Bare(values) | EmbeddingPayload::Wrapped { embedding: values } => values,
    };
    EmbeddingVector::new(values).map_err(|err| AppError::InvalidInput {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn probe() -> PathBuf {
        PathBuf::from("probe.json")
    }

    #[test]
    fn accepts_bare_arrays() {
        let vector = parse_embedding(&probe(), "[0.5, -0.25, 1]").unwrap();
        assert_eq!(vector.as_slice(), &[0.5, -0.25, 1.0]);
    }

    #[test]
    fn accepts_wrapped_objects() {
        let vector = parse_embedding(
            &probe(),
            r#"{"embedding": [1.0, 2.0], "source": "camera"}"#,
        )
        .unwrap();
        assert_eq!(vector.dimension(), 2);
    }

    #[test]
    fn rejects_malformed_payloads() {
        for contents in ["", "{\"vector\": [1.0]}", "[\"a\"]", "[]"] {
            match parse_embedding(&probe(), contents).unwrap_err() {
                AppError::InvalidInput { path, .. } => assert_eq!(path, probe()),
                other => panic!("unexpected error for {contents:?}: {other:?}"),
            }
        }
    }

    #[test]
    fn missing_file_reports_input_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = load_embedding(&path).unwrap_err();
        assert!(matches!(err, AppError::InputRead { .. }));
    }
}
