use crate::errors::{AppError, AppResult};

/// Accept/reject rule over a similarity score.
///
/// A probe is verified only when its score is strictly greater than the
/// threshold; a score equal to the threshold is rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationPolicy {
    threshold: f64,
}

impl VerificationPolicy {
    pub fn new(threshold: f64) -> AppResult<Self> {
        validate_threshold(threshold)?;
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn decide(&self, score: f64) -> bool {
        score > self.threshold
    }
}

pub fn validate_threshold(threshold: f64) -> AppResult<()> {
    if !(-1.0..=1.0).contains(&threshold) {
        return Err(AppError::Configuration(format!(
            "similarity threshold {threshold} is outside [-1, 1]"
        )));
    }
    Ok(())
}

pub fn decide(score: f64, threshold: f64) -> AppResult<bool> {
    Ok(VerificationPolicy::new(threshold)?.decide(score))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_equal_to_threshold_is_rejected() {
        assert!(!decide(0.55, 0.55).unwrap());
        assert!(!decide(-1.0, -1.0).unwrap());
        assert!(!decide(1.0, 1.0).unwrap());
    }

    #[test]
    fn score_above_threshold_is_accepted() {
        let threshold = 0.55_f64;
        let above = f64::from_bits(threshold.to_bits() + 1);
        assert!(decide(above, threshold).unwrap());
        assert!(decide(0.9, 0.5).unwrap());
        assert!(!decide(0.4, 0.5).unwrap());
    }

    #[test]
    fn thresholds_outside_similarity_range_are_rejected() {
        for threshold in [1.0 + 1e-9, -1.5, f64::NAN, f64::INFINITY] {
            let err = VerificationPolicy::new(threshold).unwrap_err();
            assert!(matches!(err, AppError::Configuration(_)), "{threshold}");
        }
        assert_eq!(VerificationPolicy::new(-1.0).unwrap().threshold(), -1.0);
        assert_eq!(VerificationPolicy::new(1.0).unwrap().threshold(), 1.0);
    }

    #[test]
    fn nan_score_is_never_verified() {
        assert!(!VerificationPolicy::new(0.0).unwrap().decide(f64::NAN));
    }
}
