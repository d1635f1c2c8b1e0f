//! Ordered fallback chain with per-method retry.

use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::adapters::{
    AdapterRegistry, FetchError, MethodKind, RawTranscript, TranscriptAdapter, TranscriptResult, WebClient,
};
use crate::config::Config;
use crate::normalize::{char_len, ValidationError, Validator};
use crate::HarvestError;

/// How one attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    /// Definitive miss: nothing to find, unparsable or too short
    Failure { reason: String },
    /// Transient error
    Error { reason: String },
}

/// One (video, method, try) record. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionAttempt {
    pub method: MethodKind,
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
pub enum Outcome {
    Acquired {
        result: TranscriptResult,
        attempts: Vec<AcquisitionAttempt>,
    },
    Failed {
        attempts: Vec<AcquisitionAttempt>,
    },
}

impl Outcome {
    pub fn attempts(&self) -> &[AcquisitionAttempt] {
        match self {
            Outcome::Acquired { attempts, .. } | Outcome::Failed { attempts } => attempts.as_slice(),
        }
    }

    pub fn result(&self) -> Option<&TranscriptResult> {
        match self {
            Outcome::Acquired { result, .. } => Some(result),
            Outcome::Failed { .. } => None,
        }
    }
}

/// Retry budget applied to each adapter independently.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Runs the enabled adapters in priority order until one yields a
/// transcript that passes validation.
pub struct Orchestrator {
    adapters: Vec<Arc<dyn TranscriptAdapter>>,
    validator: Validator,
    coarse_min: usize,
    retry: RetryPolicy,
}

impl Orchestrator {
    pub fn new(
        registry: AdapterRegistry,
        validator: Validator,
        coarse_min: usize,
        retry: RetryPolicy,
    ) -> Result<Self, HarvestError> {
        if registry.is_empty() {
            return Err(HarvestError::NoMethodsEnabled);
        }

        Ok(Self {
            adapters: registry.into_adapters(),
            validator,
            coarse_min,
            retry,
        })
    }

    pub fn from_config(config: &Config, web: Arc<dyn WebClient>) -> Result<Self, HarvestError> {
        let acq = &config.acquisition;
        Self::new(
            AdapterRegistry::from_config(config, web),
            Validator::new(acq.min_chars),
            acq.coarse_min_chars,
            RetryPolicy {
                max_retries: acq.max_retries,
                delay: Duration::from_millis(acq.retry_delay_ms),
            },
        )
    }

    pub fn methods(&self) -> Vec<MethodKind> {
        self.adapters.iter().map(|a| a.method()).collect()
    }

    pub fn min_chars(&self) -> usize {
        self.validator.min_chars()
    }

    /// Try each adapter in turn. Only transient errors are retried; any other
    /// miss moves straight on to the next adapter.
    pub async fn acquire(&self, video_id: &str) -> Outcome {
        let mut attempts = Vec::new();
        let max_tries = self.retry.max_retries.max(1);

        for adapter in &self.adapters {
            let method = adapter.method();

            for attempt in 1..=max_tries {
                let started = Instant::now();
                let fetched = adapter.fetch(video_id).await;
                let elapsed_ms = started.elapsed().as_millis() as u64;
                let record = |outcome| AcquisitionAttempt {
                    method,
                    attempt,
                    outcome,
                    elapsed_ms,
                };

                match fetched.and_then(|raw| self.accept(method, raw)) {
                    Ok(result) => {
                        tracing::debug!(
                            "{}: {} succeeded ({} chars, tier {})",
                            video_id,
                            result.method_tag(),
                            result.char_len,
                            result.tier
                        );
                        attempts.push(record(AttemptOutcome::Success));
                        return Outcome::Acquired { result, attempts };
                    }
                    Err(FetchError::Transient(reason)) => {
                        tracing::debug!("{}: {} attempt {}/{} failed: {}", video_id, method, attempt, max_tries, reason);
                        attempts.push(record(AttemptOutcome::Error { reason }));
                        if attempt < max_tries {
                            tokio::time::sleep(self.retry.delay).await;
                        }
                    }
                    Err(miss) => {
                        tracing::debug!("{}: {} found nothing: {}", video_id, method, miss);
                        attempts.push(record(AttemptOutcome::Failure {
                            reason: miss.to_string(),
                        }));
                        break;
                    }
                }
            }
        }

        tracing::warn!("{}: all {} methods exhausted", video_id, self.adapters.len());
        Outcome::Failed { attempts }
    }

    fn accept(&self, method: MethodKind, raw: RawTranscript) -> Result<TranscriptResult, FetchError> {
        let text = match self.validator.validate(&raw.text) {
            Ok(text) => text,
            Err(ValidationError::TooShort { len, min }) => return Err(FetchError::TooShort { len, min }),
        };

        let len = char_len(&text);
        TranscriptResult::new(text, method, raw, self.coarse_min).ok_or(FetchError::TooShort {
            len,
            min: self.coarse_min,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{spoken, timed_text_xml, watch_page, FakeWeb};
    use crate::adapters::{MockTranscriptAdapter, QualityTier};
    use serde_json::json;

    fn mock(method: MethodKind, result: Result<RawTranscript, FetchError>, times: usize) -> MockTranscriptAdapter {
        let mut adapter = MockTranscriptAdapter::new();
        adapter.expect_method().return_const(method);
        adapter.expect_fetch().times(times).returning(move |_| result.clone());
        adapter
    }

    fn orchestrator(adapters: Vec<MockTranscriptAdapter>) -> Orchestrator {
        let mut registry = AdapterRegistry::empty();
        for adapter in adapters {
            registry.register(Arc::new(adapter));
        }
        Orchestrator::new(registry, Validator::default(), 50, RetryPolicy::default()).unwrap()
    }

    fn manual(words: &str) -> RawTranscript {
        RawTranscript::new(spoken(words, 6), QualityTier::Manual, "manual")
    }

    #[test]
    fn test_empty_registry_is_fatal() {
        let result = Orchestrator::new(AdapterRegistry::empty(), Validator::default(), 50, RetryPolicy::default());
        assert!(matches!(result, Err(HarvestError::NoMethodsEnabled)));
    }

    #[tokio::test]
    async fn test_first_success_stops_the_chain() {
        let mut fallback = MockTranscriptAdapter::new();
        fallback.expect_method().return_const(MethodKind::TimedText);
        fallback.expect_fetch().never();

        let orchestrator = orchestrator(vec![
            mock(MethodKind::Structured, Ok(manual("first strategy wins outright")), 1),
            fallback,
        ]);

        let outcome = orchestrator.acquire("v").await;
        let result = outcome.result().unwrap();
        assert_eq!(result.method, MethodKind::Structured);
        assert_eq!(result.tier, QualityTier::Manual);
        assert_eq!(outcome.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_definitive_misses_are_not_retried() {
        let orchestrator = orchestrator(vec![
            mock(MethodKind::Structured, Err(FetchError::NotFound("no captions".into())), 1),
            mock(MethodKind::TimedText, Err(FetchError::Parse("bad xml".into())), 1),
            mock(MethodKind::JsonExtract, Ok(manual("third time lucky for this one")), 1),
        ]);

        let outcome = orchestrator.acquire("v").await;
        assert_eq!(outcome.result().unwrap().method, MethodKind::JsonExtract);
        let methods: Vec<_> = outcome.attempts().iter().map(|a| a.method).collect();
        assert_eq!(methods, vec![MethodKind::Structured, MethodKind::TimedText, MethodKind::JsonExtract]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_use_full_retry_budget() {
        let orchestrator = orchestrator(vec![
            mock(MethodKind::Structured, Err(FetchError::Transient("429".into())), 3),
            mock(MethodKind::TimedText, Err(FetchError::NotFound("none".into())), 1),
        ]);

        let started = tokio::time::Instant::now();
        let outcome = orchestrator.acquire("v").await;

        assert!(outcome.result().is_none());
        assert_eq!(outcome.attempts().len(), 4);
        assert_eq!(outcome.attempts()[2].attempt, 3);
        assert!(matches!(outcome.attempts()[0].outcome, AttemptOutcome::Error { .. }));
        // two pauses between three tries
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(2) && waited < Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_then_success() {
        let mut flaky = MockTranscriptAdapter::new();
        flaky.expect_method().return_const(MethodKind::Structured);
        let mut seq = mockall::Sequence::new();
        flaky
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(FetchError::Transient("reset".into())));
        flaky
            .expect_fetch()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(manual("recovered on the second attempt")));

        let outcome = orchestrator(vec![flaky]).acquire("v").await;
        assert!(outcome.result().is_some());
        assert_eq!(outcome.attempts().last().unwrap().attempt, 2);
    }

    #[tokio::test]
    async fn test_validation_failure_moves_on() {
        let short = RawTranscript::new("<b>too</b> short".into(), QualityTier::Manual, "manual");
        let orchestrator = orchestrator(vec![
            mock(MethodKind::Structured, Ok(short), 1),
            mock(MethodKind::TimedText, Ok(manual("the fallback has enough text")), 1),
        ]);

        let outcome = orchestrator.acquire("v").await;
        assert_eq!(outcome.result().unwrap().method, MethodKind::TimedText);
        assert!(matches!(outcome.attempts()[0].outcome, AttemptOutcome::Failure { .. }));
    }

    #[tokio::test]
    async fn test_accepted_text_is_normalized() {
        let noisy = format!("<i>{}</i>\u{200B}\n\n", spoken("line   with\tspacing", 8));
        let raw = RawTranscript::new(noisy, QualityTier::Auto, "auto");
        let outcome = orchestrator(vec![mock(MethodKind::TimedText, Ok(raw), 1)]).acquire("v").await;

        let result = outcome.result().unwrap();
        assert_eq!(result.text, spoken("line with spacing", 8));
        assert!(result.char_len >= 100);
    }

    // End-to-end scenarios over the real adapters and canned payloads.

    fn chain(methods: &[MethodKind], web: FakeWeb) -> (Orchestrator, Arc<FakeWeb>) {
        let mut config = Config::default();
        config.acquisition.methods = methods.to_vec();
        config.http.base_url = "https://host".to_string();
        let web = Arc::new(web);
        let orchestrator = Orchestrator::from_config(&config, web.clone()).unwrap();
        (orchestrator, web)
    }

    fn player(tracks: serde_json::Value) -> serde_json::Value {
        json!({
            "playabilityStatus": {"status": "OK"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": tracks}}
        })
    }

    #[tokio::test]
    async fn test_manual_english_track_uses_structured_only() {
        let text = spoken("a manually captioned english lecture", 5);
        let tracks = json!([{"baseUrl": "https://host/api/timedtext?v=abc123&lang=en", "languageCode": "en"}]);
        let web = FakeWeb::new()
            .route("/watch?v=abc123", watch_page(&player(tracks.clone())))
            .route("/youtubei/v1/player", player(tracks).to_string())
            .route("/api/timedtext?v=abc123&lang=en", timed_text_xml(&[&text]));
        let (orchestrator, web) = chain(&MethodKind::default_enabled(), web);

        let outcome = orchestrator.acquire("abc123").await;
        let result = outcome.result().unwrap();
        assert_eq!(result.tier, QualityTier::Manual);
        assert_eq!(result.method, MethodKind::Structured);
        assert_eq!(outcome.attempts().len(), 1);
        assert_eq!(web.calls_matching("type=list"), 0);
    }

    #[tokio::test]
    async fn test_vietnamese_only_track_is_translated() {
        let text = spoken("machine translated from vietnamese", 5);
        let tracks = json!([{
            "baseUrl": "https://host/api/timedtext?v=xyz789&lang=vi",
            "languageCode": "vi",
            "isTranslatable": true
        }]);
        let web = FakeWeb::new()
            .route("/watch?v=xyz789", watch_page(&player(tracks.clone())))
            .route("/youtubei/v1/player", player(tracks).to_string())
            .route("lang=vi&tlang=en", timed_text_xml(&[&text]));
        let (orchestrator, _) = chain(&MethodKind::default_enabled(), web);

        let outcome = orchestrator.acquire("xyz789").await;
        let result = outcome.result().unwrap();
        assert_eq!(result.tier, QualityTier::Translated);
        assert_eq!(result.variant, "translated-vi");
        assert_eq!(result.source_language.as_deref(), Some("vi"));
    }

    #[tokio::test]
    async fn test_empty_timed_text_falls_through() {
        let text = spoken("recovered from the page configuration", 5);
        let listing = r#"<transcript_list><track id="0" name="" lang_code="en"/></transcript_list>"#;
        let tracks = json!([{"baseUrl": "https://host/api/timedtext?v=c&lang=en&from=page", "languageCode": "en"}]);
        let web = FakeWeb::new()
            .route("type=list", listing)
            .route("from=page", timed_text_xml(&[&text]))
            .route("/api/timedtext?v=c&lang=en", "<?xml version=\"1.0\"?><transcript></transcript>")
            .route("/watch?v=c", watch_page(&player(tracks)));
        let (orchestrator, _) = chain(&[MethodKind::TimedText, MethodKind::PageCaptions], web);

        let outcome = orchestrator.acquire("c").await;
        assert_eq!(outcome.result().unwrap().method, MethodKind::PageCaptions);
        assert_eq!(
            outcome.attempts()[0].outcome,
            AttemptOutcome::Failure {
                reason: FetchError::TooShort { len: 0, min: 100 }.to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_every_method_failing_is_a_failed_outcome() {
        let (orchestrator, _) = chain(&MethodKind::default_enabled(), FakeWeb::new());

        let outcome = orchestrator.acquire("deadbeef").await;
        assert!(outcome.result().is_none());
        let methods: Vec<_> = outcome.attempts().iter().map(|a| a.method).collect();
        assert_eq!(methods, MethodKind::default_enabled());
    }
}
