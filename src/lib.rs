//! Caption Harvest - transcript acquisition for externally hosted videos
//!
//! This library tries an ordered chain of caption retrieval strategies for each
//! video, normalizes whatever payload each strategy returns, validates it and
//! commits it to the transcript catalog without regressing better stored data.

pub mod acquire;
pub mod adapters;
pub mod cli;
pub mod config;
pub mod normalize;
pub mod output;
pub mod parsers;
pub mod persist;
pub mod scheduler;
pub mod store;
pub mod utils;

pub use acquire::{AcquisitionAttempt, Orchestrator, Outcome};
pub use adapters::{MethodKind, QualityTier, TranscriptAdapter, TranscriptResult};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use persist::{CommitOutcome, PersistencePolicy};
pub use scheduler::{RunStats, Scheduler, StopSignal};
pub use store::{TranscriptStore, VideoCandidate};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types that end a harvest run
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    #[error("No retrieval method is enabled")]
    NoMethodsEnabled,

    #[error("Unknown retrieval method: {0}")]
    UnknownMethod(String),

    #[error("Transcript store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid video id: {0}")]
    InvalidVideoId(String),
}
