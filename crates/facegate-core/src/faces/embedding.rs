use serde::{Deserialize, Serialize};

use crate::errors::{AppError, AppResult};

/// Face embedding produced by the external embedder.
///
/// Stored records always hold the unit-length form. Components are owned, so
/// cloning a record's embedding never aliases store state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct EmbeddingVector(Vec<f64>);

impl EmbeddingVector {
    pub fn new(values: Vec<f64>) -> AppResult<Self> {
        if values.is_empty() {
            return Err(AppError::DegenerateVector(
                "embedding has no components".into(),
            ));
        }
        if let Some(idx) = values.iter().position(|value| !value.is_finite()) {
            return Err(AppError::DegenerateVector(format!(
                "component {idx} is not a finite number"
            )));
        }
        Ok(Self(values))
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Euclidean length. Saturates to infinity only when the true length
    /// exceeds `f64::MAX`.
    pub fn norm(&self) -> f64 {
        let (scale, scaled) = scaled_norm(&self.0);
        scale * scaled
    }

    /// Returns a unit-length copy. Only an all-zero vector is rejected.
    pub fn normalized(&self) -> AppResult<Self> {
        let (scale, scaled) = scaled_norm(&self.0);
        if scale == 0.0 {
            return Err(AppError::DegenerateVector(
                "embedding has zero magnitude".into(),
            ));
        }
        Ok(Self(
            self.0
                .iter()
                .map(|value| value / scale / scaled)
                .collect(),
        ))
    }

    pub fn ensure_dimension(&self, expected: usize) -> AppResult<()> {
        if self.dimension() != expected {
            return Err(AppError::ShapeMismatch {
                expected,
                found: self.dimension(),
            });
        }
        Ok(())
    }

    pub fn cosine_similarity(&self, other: &EmbeddingVector) -> AppResult<f64> {
        other.ensure_dimension(self.dimension())?;
        cosine_similarity(&self.0, &other.0)
    }
}

impl TryFrom<Vec<f64>> for EmbeddingVector {
    type Error = AppError;

    fn try_from(values: Vec<f64>) -> AppResult<Self> {
        Self::new(values)
    }
}

impl From<EmbeddingVector> for Vec<f64> {
    fn from(vector: EmbeddingVector) -> Self {
        vector.0
    }
}

/// Largest absolute component and the length of the vector divided by it.
/// Keeps squares within range for very large or very small components.
fn scaled_norm(values: &[f64]) -> (f64, f64) {
    let scale = values.iter().fold(0.0_f64, |acc, value| acc.max(value.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return (scale, 1.0);
    }
    let sum = values
        .iter()
        .map(|value| {
            let unit = value / scale;
            unit * unit
        })
        .sum::<f64>();
    (scale, sum.sqrt())
}

pub fn cosine_similarity(lhs: &[f64], rhs: &[f64]) -> AppResult<f64> {
    if lhs.len() != rhs.len() {
        return Err(AppError::ShapeMismatch {
            expected: lhs.len(),
            found: rhs.len(),
        });
    }

    let (scale_lhs, norm_lhs) = scaled_norm(lhs);
    let (scale_rhs, norm_rhs) = scaled_norm(rhs);
    if scale_lhs == 0.0 || scale_rhs == 0.0 {
        return Err(AppError::DegenerateVector(
            "cannot compare a zero-magnitude embedding".into(),
        ));
    }

    let dot = lhs
        .iter()
        .zip(rhs.iter())
        .map(|(l, r)| (l / scale_lhs) * (r / scale_rhs))
        .sum::<f64>();
    let similarity = dot / (norm_lhs * norm_rhs);
    if !similarity.is_finite() {
        return Err(AppError::DegenerateVector(
            "similarity is not a finite number".into(),
        ));
    }

    Ok(similarity.clamp(-1.0, 1.0))
}
