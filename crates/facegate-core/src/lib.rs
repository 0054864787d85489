//! Enrollment store and verification engine for face embeddings.
//!
//! Face detection, alignment and the embedding network live outside this
//! crate and plug in through [`faces::FaceAligner`] and [`faces::FaceEmbedder`].

pub mod errors;
pub mod faces;

pub use errors::{AppError, AppResult};
