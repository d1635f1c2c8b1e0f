use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::{
    CandidateQuery, ChannelCoverage, LengthStats, StatusReport, StoreError, StoredTranscript, TranscriptStore,
    VideoCandidate, REPORT_CHANNELS, REPORT_MISSING_SAMPLE,
};
use crate::adapters::TranscriptResult;
use crate::normalize::char_len;

#[derive(Debug, Clone)]
struct Row {
    video: VideoCandidate,
    transcript: Option<StoredTranscript>,
}

/// Process-local catalog with the same semantics as the SQLite one.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<String, Row>>,
    writes: AtomicUsize,
    fail_writes_for: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_videos(videos: &[VideoCandidate]) -> Self {
        let store = Self::new();
        if let Ok(mut rows) = store.rows.lock() {
            for video in videos {
                rows.insert(
                    video.video_id.clone(),
                    Row {
                        video: video.clone(),
                        transcript: None,
                    },
                );
            }
        }
        store
    }

    /// Number of successful transcript writes so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every write for `video_id` fail with a query error.
    #[cfg(test)]
    pub fn fail_writes_for(&self, video_id: &str) {
        if let Ok(mut ids) = self.fail_writes_for.lock() {
            ids.push(video_id.to_string());
        }
    }

    /// Simulate a lost connection: every call fails as unavailable.
    #[cfg(test)]
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seed a stored transcript without counting it as a write.
    #[cfg(test)]
    pub fn put_transcript(&self, video_id: &str, transcript: StoredTranscript) {
        if let Ok(mut rows) = self.rows.lock() {
            if let Some(row) = rows.get_mut(video_id) {
                row.transcript = Some(transcript);
            }
        }
    }

    fn rows(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, Row>>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".to_string()));
        }
        self.rows
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

fn has_text(row: &Row) -> bool {
    row.transcript.as_ref().is_some_and(|t| !t.text.is_empty())
}

fn by_views(a: &VideoCandidate, b: &VideoCandidate) -> std::cmp::Ordering {
    b.view_count.cmp(&a.view_count).then_with(|| a.video_id.cmp(&b.video_id))
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn list_candidates(&self, query: CandidateQuery) -> Result<Vec<VideoCandidate>, StoreError> {
        let rows = self.rows()?;
        let mut candidates: Vec<VideoCandidate> = rows
            .values()
            .filter(|row| {
                query.refresh
                    || row
                        .transcript
                        .as_ref()
                        .map_or(true, |t| t.char_len() < query.min_chars)
            })
            .map(|row| row.video.clone())
            .collect();

        candidates.sort_by(by_views);
        if let Some(limit) = query.limit {
            candidates.truncate(limit);
        }
        Ok(candidates)
    }

    async fn stored_transcript(&self, video_id: &str) -> Result<Option<StoredTranscript>, StoreError> {
        let rows = self.rows()?;
        Ok(rows
            .get(video_id)
            .filter(|row| has_text(row))
            .and_then(|row| row.transcript.clone()))
    }

    async fn upsert_transcript(&self, video_id: &str, result: &TranscriptResult) -> Result<(), StoreError> {
        let mut rows = self.rows()?;

        let failing = self
            .fail_writes_for
            .lock()
            .map(|ids| ids.iter().any(|id| id == video_id))
            .unwrap_or(false);
        if failing {
            return Err(StoreError::Query(format!("write rejected for {}", video_id)));
        }

        let row = rows
            .get_mut(video_id)
            .ok_or_else(|| StoreError::UnknownVideo(video_id.to_string()))?;
        row.transcript = Some(StoredTranscript {
            text: result.text.clone(),
            tier: Some(result.tier),
            method: Some(result.method_tag()),
            updated_at: Some(Utc::now()),
        });
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn import_videos(&self, videos: &[VideoCandidate]) -> Result<usize, StoreError> {
        let mut rows = self.rows()?;
        for video in videos {
            rows.entry(video.video_id.clone())
                .and_modify(|row| row.video = video.clone())
                .or_insert_with(|| Row {
                    video: video.clone(),
                    transcript: None,
                });
        }
        Ok(videos.len())
    }

    async fn status_report(&self) -> Result<StatusReport, StoreError> {
        let rows = self.rows()?;

        let lengths: Vec<usize> = rows
            .values()
            .filter(|row| has_text(row))
            .filter_map(|row| row.transcript.as_ref().map(|t| char_len(&t.text)))
            .collect();

        let mut channels: HashMap<&str, ChannelCoverage> = HashMap::new();
        let mut tiers: BTreeMap<String, usize> = BTreeMap::new();
        for row in rows.values() {
            let entry = channels
                .entry(row.video.channel_name.as_str())
                .or_insert_with(|| ChannelCoverage {
                    channel_name: row.video.channel_name.clone(),
                    total: 0,
                    with_transcript: 0,
                });
            entry.total += 1;
            if has_text(row) {
                entry.with_transcript += 1;
                let tier = row
                    .transcript
                    .as_ref()
                    .and_then(|t| t.tier)
                    .map_or("unknown", |t| t.as_str());
                *tiers.entry(tier.to_string()).or_default() += 1;
            }
        }

        let mut by_channel: Vec<ChannelCoverage> = channels.into_values().collect();
        by_channel.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.channel_name.cmp(&b.channel_name)));
        by_channel.truncate(REPORT_CHANNELS);

        let mut missing_sample: Vec<VideoCandidate> = rows
            .values()
            .filter(|row| !has_text(row))
            .map(|row| row.video.clone())
            .collect();
        missing_sample.sort_by(by_views);
        missing_sample.truncate(REPORT_MISSING_SAMPLE);

        Ok(StatusReport {
            total_videos: rows.len(),
            with_transcript: lengths.len(),
            without_transcript: rows.len() - lengths.len(),
            lengths: (!lengths.is_empty()).then(|| LengthStats {
                average: lengths.iter().sum::<usize>() as f64 / lengths.len() as f64,
                min: lengths.iter().copied().min().unwrap_or(0),
                max: lengths.iter().copied().max().unwrap_or(0),
            }),
            by_channel,
            missing_sample,
            by_tier: tiers.into_iter().collect(),
        })
    }
}
