use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("no face detected in the supplied image")]
    NoFaceDetected,

    #[error("embedding extraction failed: {0}")]
    Embedding(String),

    #[error("{field} cannot be empty")]
    EmptyIdentifier { field: &'static str },

    #[error("no identities are enrolled")]
    EmptyStore,

    #[error("embedding dimension mismatch: expected {expected} values, found {found}")]
    ShapeMismatch { expected: usize, found: usize },

    #[error("embedding is degenerate: {0}")]
    DegenerateVector(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to read enrollment store {path}: {source}")]
    StoreRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write enrollment store {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("enrollment store {path} is invalid: {message}")]
    InvalidStoreFile { path: PathBuf, message: String },

    #[error("enrollment store {path} is encrypted and requires a store key")]
    EncryptedStoreRequiresKey { path: PathBuf },

    #[error("enrollment store encryption error: {0}")]
    Encryption(String),

    #[error("failed to read embedding file {path}: {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("embedding file {path} is invalid: {message}")]
    InvalidInput { path: PathBuf, message: String },

    #[error("failed to read configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration file {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AppError {
    /// Durable read/write failures and unreadable store contents.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            AppError::StoreRead { .. }
                | AppError::StoreWrite { .. }
                | AppError::InvalidStoreFile { .. }
                | AppError::EncryptedStoreRequiresKey { .. }
                | AppError::Encryption(_)
        )
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::NoFaceDetected => ExitCode::from(2),
            AppError::Embedding(_) => ExitCode::from(2),
            AppError::EmptyIdentifier { .. } => ExitCode::from(2),
            AppError::DegenerateVector(_) => ExitCode::from(2),
            AppError::Configuration(_) => ExitCode::from(2),
            AppError::InputRead { .. } => ExitCode::from(2),
            AppError::InvalidInput { .. } => ExitCode::from(2),
            AppError::ConfigRead { .. } => ExitCode::from(2),
            AppError::ConfigParse { .. } => ExitCode::from(2),
            AppError::EmptyStore => ExitCode::from(4),
            AppError::ShapeMismatch { .. } => ExitCode::from(4),
            err if err.is_store_error() => ExitCode::from(3),
            _ => ExitCode::from(1),
        }
    }

    pub fn human_message(&self) -> String {
        self.to_string()
    }
}

pub type AppResult<T> = Result<T, AppError>;
