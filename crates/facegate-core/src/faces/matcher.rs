use serde::Serialize;

use crate::errors::AppResult;
use crate::faces::embedding::EmbeddingVector;
use crate::faces::store::EnrollmentRecord;

/// Score reported when there was nothing to compare against.
pub const NO_CANDIDATE_SCORE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestMatch {
    pub identity_id: Option<String>,
    pub display_name: Option<String>,
    pub score: f64,
}

impl BestMatch {
    pub fn none() -> Self {
        Self {
            identity_id: None,
            display_name: None,
            score: NO_CANDIDATE_SCORE,
        }
    }

    pub fn has_candidate(&self) -> bool {
        self.identity_id.is_some()
    }
}

/// Linear nearest-match scan over stored unit-length embeddings.
///
/// The first record reaching the maximum wins; later records must score
/// strictly higher to replace it.
pub fn find_best_match<'a, I>(probe: &EmbeddingVector, records: I) -> AppResult<BestMatch>
where
    I: IntoIterator<Item = &'a EnrollmentRecord>,
{
    let mut records = records.into_iter().peekable();
    if records.peek().is_none() {
        return Ok(BestMatch::none());
    }

    let probe = probe.normalized()?;
    let mut best_score = f64::NEG_INFINITY;
    let mut best: Option<&EnrollmentRecord> = None;

    for record in records {
        let score = record.embedding.cosine_similarity(&probe)?;
        if score > best_score {
            best_score = score;
            best = Some(record);
        }
    }

    Ok(match best {
        Some(record) => BestMatch {
            identity_id: Some(record.identity_id.clone()),
            display_name: Some(record.display_name.clone()),
            score: best_score,
        },
        None => BestMatch::none(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::errors::AppError;

    fn record(id: &str, values: &[f64]) -> EnrollmentRecord {
        EnrollmentRecord {
            identity_id: id.into(),
            display_name: format!("name-{id}"),
            embedding: EmbeddingVector::new(values.to_vec())
                .unwrap()
                .normalized()
                .unwrap(),
            created_at: Utc::now(),
        }
    }

    fn probe(values: &[f64]) -> EmbeddingVector {
        EmbeddingVector::new(values.to_vec()).unwrap()
    }

    #[test]
    fn empty_snapshot_returns_sentinel() {
        let records: Vec<EnrollmentRecord> = Vec::new();
        let best = find_best_match(&probe(&[1.0, 0.0]), &records).unwrap();
        assert_eq!(best, BestMatch::none());
        assert_eq!(best.score, NO_CANDIDATE_SCORE);
        assert!(!best.has_candidate());
    }

    #[test]
    fn picks_highest_similarity() {
        let records = vec![
            record("a", &[1.0, 0.0, 0.0]),
            record("b", &[0.6, 0.8, 0.0]),
            record("c", &[0.0, 0.0, 1.0]),
        ];
        let best = find_best_match(&probe(&[0.0, 5.0, 0.1]), &records).unwrap();
        assert_eq!(best.identity_id.as_deref(), Some("b"));
        assert_eq!(best.display_name.as_deref(), Some("name-b"));
        assert!(best.score > 0.79 && best.score < 0.81);
    }

    #[test]
    fn first_record_wins_ties() {
        let records = vec![
            record("first", &[1.0, 1.0]),
            record("second", &[1.0, 1.0]),
        ];
        let best = find_best_match(&probe(&[1.0, 0.0]), &records).unwrap();
        assert_eq!(best.identity_id.as_deref(), Some("first"));
    }

    #[test]
    fn opposite_only_candidate_is_still_reported() {
        let records = vec![record("a", &[1.0, 0.0])];
        let best = find_best_match(&probe(&[-3.0, 0.0]), &records).unwrap();
        assert_eq!(best.identity_id.as_deref(), Some("a"));
        assert!((best.score + 1.0).abs() < 1e-12);
    }

    #[test]
    fn probe_dimension_must_match() {
        let records = vec![record("a", &[1.0, 0.0])];
        let err = find_best_match(&probe(&[1.0, 0.0, 0.0]), &records).unwrap_err();
        assert!(matches!(
            err,
            AppError::ShapeMismatch {
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn degenerate_probe_is_rejected() {
        let records = vec![record("a", &[1.0, 0.0])];
        let err = find_best_match(&probe(&[0.0, 0.0]), &records).unwrap_err();
        assert!(matches!(err, AppError::DegenerateVector(_)));
    }
}
