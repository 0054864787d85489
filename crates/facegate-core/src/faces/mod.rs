pub mod embedding;
pub mod engine;
pub mod matcher;
pub mod pipeline;
pub mod policy;
pub mod store;

pub use embedding::{cosine_similarity, EmbeddingVector};

pub use engine::{
    validate_identifiers, EngineOptions, EngineStatus, FaceEngine, VerificationResult,
};

pub use matcher::{find_best_match, BestMatch, NO_CANDIDATE_SCORE};

pub use pipeline::{FaceAligner, FaceEmbedder, FacePipeline};

pub use policy::{decide, validate_threshold, VerificationPolicy};

pub use store::{
    read_store_document, EnrollmentMap, EnrollmentRecord, EnrollmentStore, FaceStore,
    FilesystemFaceStore, IdentitySummary, StoreDocument, StoreKey, STORE_KEY_LEN, STORE_VERSION,
};
