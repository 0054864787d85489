use std::path::PathBuf;

use image::RgbImage;
use serde::Serialize;
use tracing::info;

use crate::errors::{AppError, AppResult};
use crate::faces::embedding::EmbeddingVector;
use crate::faces::matcher::find_best_match;
use crate::faces::pipeline::{FaceAligner, FaceEmbedder, FacePipeline};
use crate::faces::policy::VerificationPolicy;
use crate::faces::store::{
    EnrollmentRecord, EnrollmentStore, FaceStore, FilesystemFaceStore, IdentitySummary, StoreKey,
};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub store_path: PathBuf,
    pub store_key: Option<StoreKey>,
    pub dimension: Option<usize>,
}

impl EngineOptions {
    pub fn new(store_path: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            store_key: None,
            dimension: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationResult {
    pub verified: bool,
    /// Set only when `verified` is true.
    pub identity_id: Option<String>,
    /// Set only when `verified` is true.
    pub display_name: Option<String>,
    pub score: f64,
    /// `score` clamped to `[0, 1]`.
    pub confidence: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStatus {
    pub enrolled: usize,
    pub dimension: Option<usize>,
    pub identities: Vec<IdentitySummary>,
}

/// Enroll/verify/list/clear over one exclusively owned [`EnrollmentStore`].
pub struct FaceEngine<S = FilesystemFaceStore> {
    store: EnrollmentStore<S>,
}

impl FaceEngine<FilesystemFaceStore> {
    pub fn open(options: EngineOptions) -> Self {
        let store = EnrollmentStore::open(options.store_path, options.store_key)
            .with_dimension(options.dimension);
        Self { store }
    }
}

impl<S: FaceStore> FaceEngine<S> {
    pub fn with_store(store: EnrollmentStore<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &EnrollmentStore<S> {
        &self.store
    }

    pub fn enroll(
        &self,
        identity_id: &str,
        display_name: &str,
        embedding: &EmbeddingVector,
    ) -> AppResult<EnrollmentRecord> {
        validate_identifiers(identity_id, display_name)?;
        let record = self.store.put(identity_id, display_name, embedding)?;
        info!(
            identity_id,
            dimension = record.embedding.dimension(),
            "enrolled identity"
        );
        Ok(record)
    }

    pub fn verify(
        &self,
        embedding: &EmbeddingVector,
        threshold: f64,
    ) -> AppResult<VerificationResult> {
        let policy = VerificationPolicy::new(threshold)?;
        let records = self.store.load()?;
        if records.is_empty() {
            return Err(AppError::EmptyStore);
        }

        let best = find_best_match(embedding, records.values())?;
        let verified = best.has_candidate() && policy.decide(best.score);
        info!(
            verified,
            score = best.score,
            threshold,
            candidates = records.len(),
            "verification decided"
        );

        let (identity_id, display_name) = if verified {
            (best.identity_id, best.display_name)
        } else {
            (None, None)
        };
        Ok(VerificationResult {
            verified,
            identity_id,
            display_name,
            score: best.score,
            confidence: best.score.clamp(0.0, 1.0),
            threshold: policy.threshold(),
        })
    }

    pub fn list(&self) -> AppResult<Vec<IdentitySummary>> {
        self.store.list()
    }

    pub fn remove(&self, identity_id: &str) -> AppResult<bool> {
        let removed = self.store.remove(identity_id)?;
        if removed {
            info!(identity_id, "removed identity");
        }
        Ok(removed)
    }

    pub fn clear(&self) -> AppResult<()> {
        self.store.remove_all()?;
        info!("cleared all enrollments");
        Ok(())
    }

    pub fn status(&self) -> AppResult<EngineStatus> {
        let document = self.store.snapshot()?;
        let identities = document
            .records
            .values()
            .map(IdentitySummary::from)
            .collect::<Vec<_>>();
        Ok(EngineStatus {
            enrolled: identities.len(),
            dimension: self.store.configured_dimension().or(document.dimension),
            identities,
        })
    }

    pub fn enroll_image<A, E>(
        &self,
        pipeline: &FacePipeline<A, E>,
        identity_id: &str,
        display_name: &str,
        image: &RgbImage,
    ) -> AppResult<EnrollmentRecord>
    where
        A: FaceAligner,
        E: FaceEmbedder,
    {
        validate_identifiers(identity_id, display_name)?;
        let embedding = pipeline.extract(image)?;
        self.enroll(identity_id, display_name, &embedding)
    }

    pub fn verify_image<A, E>(
        &self,
        pipeline: &FacePipeline<A, E>,
        image: &RgbImage,
        threshold: f64,
    ) -> AppResult<VerificationResult>
    where
        A: FaceAligner,
        E: FaceEmbedder,
    {
        let embedding = pipeline.extract(image)?;
        self.verify(&embedding, threshold)
    }
}

pub fn validate_identifiers(identity_id: &str, display_name: &str) -> AppResult<()> {
    if identity_id.trim().is_empty() {
        return Err(AppError::EmptyIdentifier {
            field: "identity id",
        });
    }
    if display_name.trim().is_empty() {
        return Err(AppError::EmptyIdentifier {
            field: "display name",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::TempDir;

    fn vector(values: &[f64]) -> EmbeddingVector {
        EmbeddingVector::new(values.to_vec()).unwrap()
    }

    fn engine(tmp: &TempDir) -> FaceEngine {
        FaceEngine::open(EngineOptions::new(tmp.path().join("store.json")))
    }

    #[test]
    fn verify_on_empty_store_fails() {
        let tmp = TempDir::new().unwrap();
        let err = engine(&tmp).verify(&vector(&[1.0, 0.0]), 0.5).unwrap_err();
        assert!(matches!(err, AppError::EmptyStore));
    }

    #[test]
    fn enrolled_probe_verifies_itself() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        let probe = vector(&[0.2, -0.4, 0.9, 0.1]);
        engine.enroll("u1", "Alice", &probe).unwrap();

        let result = engine.verify(&probe, 0.99).unwrap();
        assert!(result.verified);
        assert_eq!(result.identity_id.as_deref(), Some("u1"));
        assert_eq!(result.display_name.as_deref(), Some("Alice"));
        assert!((result.score - 1.0).abs() < 1e-9);
        assert!((result.confidence - 1.0).abs() < 1e-9);
        assert_eq!(result.threshold, 0.99);
    }

    #[test]
    fn rejected_probe_reports_score_without_identity() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        engine.enroll("u1", "Alice", &vector(&[1.0, 0.0])).unwrap();

        let result = engine.verify(&vector(&[-1.0, 0.0]), 0.5).unwrap();
        assert!(!result.verified);
        assert!(result.identity_id.is_none());
        assert!(result.display_name.is_none());
        assert!((result.score + 1.0).abs() < 1e-12);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn blank_identifiers_are_rejected_before_mutation() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        for (id, name, field) in [
            ("", "Alice", "identity id"),
            ("  ", "Alice", "identity id"),
            ("u1", "", "display name"),
        ] {
            match engine.enroll(id, name, &vector(&[1.0])).unwrap_err() {
                AppError::EmptyIdentifier { field: got } => assert_eq!(got, field),
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert!(!tmp.path().join("store.json").exists());
    }

    #[test]
    fn threshold_outside_range_is_a_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        engine.enroll("u1", "Alice", &vector(&[1.0, 0.0])).unwrap();
        let err = engine.verify(&vector(&[1.0, 0.0]), 1.5).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }

    #[test]
    fn corrupt_store_fails_closed() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        engine.enroll("u1", "Alice", &vector(&[1.0, 0.0])).unwrap();
        std::fs::write(tmp.path().join("store.json"), b"\x00garbage").unwrap();

        let err = engine.verify(&vector(&[1.0, 0.0]), -1.0).unwrap_err();
        assert!(err.is_store_error());
    }

    #[test]
    fn status_summarises_store() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        assert_eq!(
            engine.status().unwrap(),
            EngineStatus {
                enrolled: 0,
                dimension: None,
                identities: vec![],
            }
        );

        engine.enroll("u2", "Bob", &vector(&[0.0, 1.0])).unwrap();
        engine.enroll("u1", "Alice", &vector(&[1.0, 0.0])).unwrap();
        let status = engine.status().unwrap();
        assert_eq!(status.enrolled, 2);
        assert_eq!(status.dimension, Some(2));
        assert_eq!(status.identities[0].identity_id, "u1");
        assert_eq!(status.identities[1].identity_id, "u2");
    }

    struct PassThrough;

    impl FaceAligner for PassThrough {
        fn align(&self, image: &RgbImage) -> AppResult<RgbImage> {
            if image.width() == 0 {
                return Err(AppError::NoFaceDetected);
            }
            Ok(image.clone())
        }
    }

    #[derive(Default)]
    struct FirstPixel {
        calls: Cell<usize>,
    }

    impl FaceEmbedder for FirstPixel {
        fn embed(&self, aligned: &RgbImage) -> AppResult<EmbeddingVector> {
            self.calls.set(self.calls.get() + 1);
            let pixel = aligned.get_pixel(0, 0);
            EmbeddingVector::new(pixel.0.iter().map(|c| f64::from(*c)).collect())
        }
    }

    #[test]
    fn image_operations_delegate_to_pipeline() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        let pipeline = FacePipeline::new(PassThrough, FirstPixel::default());
        let red = RgbImage::from_pixel(2, 2, image::Rgb([200, 0, 0]));
        let green = RgbImage::from_pixel(2, 2, image::Rgb([0, 200, 0]));

        engine.enroll_image(&pipeline, "u1", "Alice", &red).unwrap();
        let hit = engine.verify_image(&pipeline, &red, 0.5).unwrap();
        assert!(hit.verified);
        let miss = engine.verify_image(&pipeline, &green, 0.5).unwrap();
        assert!(!miss.verified);

        let err = engine
            .verify_image(&pipeline, &RgbImage::new(0, 0), 0.5)
            .unwrap_err();
        assert!(matches!(err, AppError::NoFaceDetected));
    }

    #[test]
    fn image_enroll_validates_identifiers_first() {
        let tmp = TempDir::new().unwrap();
        let engine = engine(&tmp);
        let pipeline = FacePipeline::new(PassThrough, FirstPixel::default());
        let image = RgbImage::from_pixel(1, 1, image::Rgb([1, 2, 3]));

        let err = engine.enroll_image(&pipeline, "", "Alice", &image).unwrap_err();
        assert!(matches!(err, AppError::EmptyIdentifier { .. }));
    }
}
