//! Seams for the detection, alignment and embedding collaborators.
//!
//! The engine never looks inside an image; it only needs "find and align a
//! face, or fail" followed by "turn the aligned face into a vector".

use image::RgbImage;
use tracing::debug;

use crate::errors::AppResult;
use crate::faces::embedding::EmbeddingVector;

pub trait FaceAligner {
    /// Detects the most prominent face and returns it aligned, or
    /// [`AppError::NoFaceDetected`](crate::errors::AppError::NoFaceDetected).
    fn align(&self, image: &RgbImage) -> AppResult<RgbImage>;
}

pub trait FaceEmbedder {
    /// Maps an aligned face to its embedding, or
    /// [`AppError::Embedding`](crate::errors::AppError::Embedding).
    fn embed(&self, aligned: &RgbImage) -> AppResult<EmbeddingVector>;
}

/// Aligner followed by embedder.
pub struct FacePipeline<A, E> {
    aligner: A,
    embedder: E,
}

impl<A: FaceAligner, E: FaceEmbedder> FacePipeline<A, E> {
    pub fn new(aligner: A, embedder: E) -> Self {
        Self { aligner, embedder }
    }

    pub fn extract(&self, image: &RgbImage) -> AppResult<EmbeddingVector> {
        let aligned = self.aligner.align(image)?;
        debug!(
            width = aligned.width(),
            height = aligned.height(),
            "aligned face"
        );
        let embedding = self.embedder.embed(&aligned)?;
        debug!(dimension = embedding.dimension(), "extracted embedding");
        Ok(embedding)
    }

    /// Embeds an image that is already an aligned face crop.
    pub fn extract_aligned(&self, aligned: &RgbImage) -> AppResult<EmbeddingVector> {
        self.embedder.embed(aligned)
    }
}
