//! Batch runs over the candidate list.

use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

use crate::acquire::{Orchestrator, Outcome};
use crate::persist::{CommitOutcome, PersistencePolicy};
use crate::store::{CandidateQuery, StoreError, TranscriptStore, VideoCandidate};
use crate::utils::{format_duration, truncate_title};
use crate::HarvestError;

/// Cooperative cancellation shared between the run and whoever stops it.
#[derive(Clone, Default)]
pub struct StopSignal {
    inner: Arc<StopInner>,
}

#[derive(Default)]
struct StopInner {
    stopped: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Resolves once `stop` has been called.
    pub async fn stopped(&self) {
        let notified = self.inner.notify.notified();
        if self.is_stopped() {
            return;
        }
        notified.await;
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub concurrency: usize,
    pub limit: Option<usize>,
    pub refresh: bool,
    pub show_progress: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_secs(2),
            concurrency: 4,
            limit: None,
            refresh: false,
            show_progress: false,
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub candidates: usize,
    pub attempted: usize,
    /// Videos for which some method produced a valid transcript
    pub succeeded: usize,
    pub committed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub store_errors: usize,
    /// Candidates never started because the run was stopped
    pub cancelled: usize,
    pub pauses: usize,
    /// Successes per method
    pub per_method: BTreeMap<String, usize>,
    /// Successes per `method/variant`
    pub per_variant: BTreeMap<String, usize>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl RunStats {
    pub fn average_per_item(&self) -> Option<Duration> {
        u32::try_from(self.attempted)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| self.elapsed / n)
    }

    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.attempted as f64 * 100.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("{}", "=".repeat(60));
        tracing::info!("Run summary");
        tracing::info!("{}", "=".repeat(60));
        tracing::info!("Candidates:  {}", self.candidates);
        tracing::info!("Processed:   {}", self.attempted);
        tracing::info!("Succeeded:   {} ({:.1}%)", self.succeeded, self.success_rate());
        tracing::info!("  committed: {}", self.committed);
        tracing::info!("  skipped:   {}", self.skipped);
        tracing::info!("Failed:      {}", self.failed);
        if self.store_errors > 0 {
            tracing::info!("Store errors: {}", self.store_errors);
        }
        if self.cancelled > 0 {
            tracing::info!("Not started (stopped): {}", self.cancelled);
        }
        for (method, count) in &self.per_variant {
            tracing::info!("  {:<32} {}", method, count);
        }
        tracing::info!("Pauses:      {}", self.pauses);
        tracing::info!("Elapsed:     {}", format_duration(self.elapsed));
        if let Some(average) = self.average_per_item() {
            tracing::info!("Per video:   {}", format_duration(average));
        }
    }

    fn record(&mut self, report: ItemReport) {
        match report {
            ItemReport::Cancelled => self.cancelled += 1,
            ItemReport::Failed => {
                self.attempted += 1;
                self.failed += 1;
            }
            ItemReport::Acquired { method, tag, commit } => {
                self.attempted += 1;
                match commit {
                    Ok(CommitOutcome::Committed) => self.committed += 1,
                    Ok(CommitOutcome::Skipped(_)) => self.skipped += 1,
                    Err(_) => {
                        // the transcript was found but never reached the catalog
                        self.failed += 1;
                        self.store_errors += 1;
                        return;
                    }
                }
                self.succeeded += 1;
                *self.per_method.entry(method).or_default() += 1;
                *self.per_variant.entry(tag).or_default() += 1;
            }
        }
    }
}

enum ItemReport {
    Cancelled,
    Failed,
    Acquired {
        method: String,
        tag: String,
        commit: Result<CommitOutcome, StoreError>,
    },
}

/// Pulls candidates from the store and runs each through acquisition and
/// the persistence policy, batch by batch.
pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn TranscriptStore>,
    policy: PersistencePolicy,
    settings: SchedulerSettings,
    stop: StopSignal,
}

impl Scheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn TranscriptStore>,
        policy: PersistencePolicy,
        settings: SchedulerSettings,
        stop: StopSignal,
    ) -> Self {
        Self {
            orchestrator,
            store,
            policy,
            settings,
            stop,
        }
    }

    /// Process every candidate. Errors only when the store becomes
    /// unreachable; per-video failures are counted instead.
    pub async fn run(&self) -> crate::Result<RunStats> {
        let started = Instant::now();
        let mut stats = RunStats::default();

        let query = CandidateQuery {
            min_chars: self.policy.min_chars,
            limit: self.settings.limit,
            refresh: self.settings.refresh,
        };
        let candidates = self
            .store
            .list_candidates(query)
            .await
            .map_err(|e| HarvestError::StoreUnavailable(e.to_string()))?;

        stats.candidates = candidates.len();
        if candidates.is_empty() {
            tracing::info!("No candidates: every video has a usable transcript");
            stats.elapsed = started.elapsed();
            return Ok(stats);
        }

        let batch_size = self.settings.batch_size.max(1);
        let batch_count = candidates.len().div_ceil(batch_size);
        tracing::info!(
            "Processing {} videos in {} batches of up to {} ({} at a time)",
            candidates.len(),
            batch_count,
            batch_size,
            self.settings.concurrency.max(1)
        );

        let progress = self.progress_bar(candidates.len() as u64);

        for (index, batch) in candidates.chunks(batch_size).enumerate() {
            if self.stop.is_stopped() {
                stats.cancelled += batch.len();
                continue;
            }

            tracing::debug!("Batch {}/{}", index + 1, batch_count);
            let reports: Vec<Result<ItemReport, StoreError>> = stream::iter(batch)
                .map(|candidate| self.process(candidate, &progress))
                .buffer_unordered(self.settings.concurrency.max(1))
                .collect()
                .await;

            for report in reports {
                match report {
                    Ok(report) => stats.record(report),
                    Err(fatal) => {
                        progress.abandon_with_message("store unavailable");
                        return Err(HarvestError::StoreUnavailable(fatal.to_string()).into());
                    }
                }
            }

            let last = index + 1 == batch_count;
            if !last && !self.settings.batch_delay.is_zero() && !self.stop.is_stopped() {
                stats.pauses += 1;
                tracing::debug!("Pausing {:?} before the next batch", self.settings.batch_delay);
                tokio::select! {
                    _ = tokio::time::sleep(self.settings.batch_delay) => {}
                    _ = self.stop.stopped() => {}
                }
            }
        }

        progress.finish_and_clear();
        stats.elapsed = started.elapsed();
        Ok(stats)
    }

    async fn process(&self, candidate: &VideoCandidate, progress: &ProgressBar) -> Result<ItemReport, StoreError> {
        if self.stop.is_stopped() {
            return Ok(ItemReport::Cancelled);
        }

        let video_id = candidate.video_id.as_str();
        progress.set_message(truncate_title(&candidate.title, 40));

        let report = match self.orchestrator.acquire(video_id).await {
            Outcome::Acquired { result, .. } => {
                let commit = self.policy.commit(self.store.as_ref(), video_id, &result).await;
                match &commit {
                    Ok(CommitOutcome::Committed) => tracing::info!(
                        "{} {}: saved {} chars via {}",
                        video_id,
                        truncate_title(&candidate.title, 50),
                        result.char_len,
                        result.method_tag()
                    ),
                    Ok(CommitOutcome::Skipped(reason)) => {
                        tracing::info!("{}: not saved, {}", video_id, reason)
                    }
                    Err(e) if e.is_fatal() => {
                        tracing::error!("{}: {}", video_id, e);
                        progress.inc(1);
                        return Err(StoreError::Unavailable(e.to_string()));
                    }
                    Err(e) => tracing::warn!("{}: write failed: {}", video_id, e),
                }

                ItemReport::Acquired {
                    method: result.method.to_string(),
                    tag: result.method_tag(),
                    commit,
                }
            }
            Outcome::Failed { attempts } => {
                tracing::warn!("{}: no transcript after {} attempts", video_id, attempts.len());
                ItemReport::Failed
            }
        };

        progress.inc(1);
        Ok(report)
    }

    fn progress_bar(&self, total: u64) -> ProgressBar {
        if !self.settings.show_progress {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new(total);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        {
            progress.set_style(style.progress_chars("=>-"));
        }
        progress
    }
}
