use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "facegate",
    about = "Enroll and verify face embeddings against a local identity store",
    version
)]
pub struct Cli {
    /// Emit structured JSON to stdout instead of human-readable logs
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (may be used multiple times)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Enroll (or re-enroll) an identity from an embedding file
    Enroll(EnrollArgs),
    /// Verify an embedding file against every enrolled identity
    Verify(VerifyArgs),
    /// List enrolled identities
    List(StoreArgs),
    /// Remove a single enrolled identity
    Remove(RemoveArgs),
    /// Delete the whole enrollment store
    Clear(StoreArgs),
    /// Summarise the store and effective configuration
    Status(StoreArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct StoreArgs {
    /// Enrollment store file (overrides $FACEGATE_STORE_PATH and config store_path)
    #[arg(long = "store")]
    pub store: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct EnrollArgs {
    /// Unique identity key; enrolling an existing id replaces its template
    #[arg(long = "id")]
    pub identity_id: String,

    /// Human-readable name stored with the identity
    #[arg(long = "name")]
    pub display_name: String,

    /// JSON file holding the embedding (a number array or {"embedding": [...]})
    #[arg(long)]
    pub embedding: PathBuf,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Args)]
pub struct VerifyArgs {
    /// JSON file holding the probe embedding
    #[arg(long)]
    pub embedding: PathBuf,

    /// Similarity threshold in [-1, 1]; a score must exceed it to verify
    #[arg(long, allow_negative_numbers = true)]
    pub threshold: Option<f64>,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Args)]
pub struct RemoveArgs {
    /// Identity key to remove
    #[arg(long = "id")]
    pub identity_id: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl From<bool> for OutputMode {
    fn from(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Human
        }
    }
}

impl Cli {
    pub fn output_mode(&self) -> OutputMode {
        OutputMode::from(self.json)
    }
}
