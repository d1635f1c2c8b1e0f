//! Video catalog and transcript storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::{QualityTier, TranscriptResult};
use crate::normalize::char_len;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Number of channels listed in a status report.
pub const REPORT_CHANNELS: usize = 10;

/// Number of missing-transcript videos sampled in a status report.
pub const REPORT_MISSING_SAMPLE: usize = 5;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store cannot be reached at all. Aborts a run.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store query failed: {0}")]
    Query(String),

    #[error("video not in catalog: {0}")]
    UnknownVideo(String),
}

impl StoreError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// A catalog entry eligible for transcript acquisition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoCandidate {
    pub video_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub channel_name: String,
    /// Popularity signal; used for ordering only
    #[serde(default)]
    pub view_count: u64,
}

/// What the store currently holds for a video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTranscript {
    pub text: String,
    /// `None` for rows written before tiers were recorded
    pub tier: Option<QualityTier>,
    pub method: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoredTranscript {
    /// Unknown tiers rank lowest.
    pub fn effective_tier(&self) -> QualityTier {
        self.tier.unwrap_or(QualityTier::BestEffort)
    }

    pub fn char_len(&self) -> usize {
        char_len(&self.text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateQuery {
    /// Videos whose transcript is shorter than this are candidates
    pub min_chars: usize,
    pub limit: Option<usize>,
    /// Return every video, so weaker stored tiers can be upgraded
    pub refresh: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelCoverage {
    pub channel_name: String,
    pub total: usize,
    pub with_transcript: usize,
}

impl ChannelCoverage {
    pub fn percentage(&self) -> f64 {
        percent(self.with_transcript, self.total)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LengthStats {
    pub average: f64,
    pub min: usize,
    pub max: usize,
}

/// Catalog coverage summary
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusReport {
    pub total_videos: usize,
    pub with_transcript: usize,
    pub without_transcript: usize,
    /// Present only when at least one transcript is stored
    pub lengths: Option<LengthStats>,
    /// Largest channels first
    pub by_channel: Vec<ChannelCoverage>,
    /// Most viewed videos still missing a transcript
    pub missing_sample: Vec<VideoCandidate>,
    /// Stored transcripts per tier; `unknown` for legacy rows
    pub by_tier: Vec<(String, usize)>,
}

impl StatusReport {
    pub fn coverage(&self) -> f64 {
        percent(self.with_transcript, self.total_videos)
    }
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Storage collaborator of the acquisition engine
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Videos lacking a usable transcript, most viewed first
    async fn list_candidates(&self, query: CandidateQuery) -> Result<Vec<VideoCandidate>, StoreError>;

    /// The stored transcript, if any non-empty text is stored
    async fn stored_transcript(&self, video_id: &str) -> Result<Option<StoredTranscript>, StoreError>;

    /// Write text, tier and method tag and stamp the modification time
    async fn upsert_transcript(&self, video_id: &str, result: &TranscriptResult) -> Result<(), StoreError>;

    /// Add catalog entries or refresh their metadata; transcripts are untouched
    async fn import_videos(&self, videos: &[VideoCandidate]) -> Result<usize, StoreError>;

    async fn status_report(&self) -> Result<StatusReport, StoreError>;
}
