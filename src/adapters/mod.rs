use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub mod browser;
pub mod http;
pub mod json_extract;
pub mod page_captions;
pub mod structured;
pub mod timedtext;
pub mod tracks;
pub mod ytdlp;

#[cfg(test)]
pub(crate) mod testing;

pub use http::{HttpClient, WebClient};

use crate::config::Config;
use crate::normalize::char_len;
use crate::HarvestError;

/// Provenance ranking of a transcript, lowest first so that `Ord` follows
/// trustworthiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    BestEffort,
    Translated,
    Auto,
    Manual,
}

impl QualityTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityTier::BestEffort => "best_effort",
            QualityTier::Translated => "translated",
            QualityTier::Auto => "auto",
            QualityTier::Manual => "manual",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "best_effort" => Some(QualityTier::BestEffort),
            "translated" => Some(QualityTier::Translated),
            "auto" => Some(QualityTier::Auto),
            "manual" => Some(QualityTier::Manual),
            _ => None,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieval strategies, declared in default priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Structured,
    #[serde(rename = "timedtext")]
    TimedText,
    PageCaptions,
    YtDlp,
    JsonExtract,
    Browser,
}

impl MethodKind {
    /// Every method in priority order.
    pub const ALL: [MethodKind; 6] = [
        MethodKind::Structured,
        MethodKind::TimedText,
        MethodKind::PageCaptions,
        MethodKind::YtDlp,
        MethodKind::JsonExtract,
        MethodKind::Browser,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::Structured => "structured",
            MethodKind::TimedText => "timedtext",
            MethodKind::PageCaptions => "page_captions",
            MethodKind::YtDlp => "yt_dlp",
            MethodKind::JsonExtract => "json_extract",
            MethodKind::Browser => "browser",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MethodKind::Structured => "Caption index via the player API (manual > auto > translated)",
            MethodKind::TimedText => "Direct timed-text listing endpoint",
            MethodKind::PageCaptions => "Caption tracks from the embedded player configuration",
            MethodKind::YtDlp => "Subtitle URLs reported by yt-dlp",
            MethodKind::JsonExtract => "Transcript-like strings in the embedded page data",
            MethodKind::Browser => "Rendered transcript panel from a headless browser",
        }
    }

    /// Methods enabled when the configuration does not say otherwise.
    pub fn default_enabled() -> Vec<MethodKind> {
        vec![
            MethodKind::Structured,
            MethodKind::TimedText,
            MethodKind::PageCaptions,
            MethodKind::JsonExtract,
        ]
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MethodKind {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        MethodKind::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted || (wanted == "ytdlp" && *m == MethodKind::YtDlp))
            .ok_or_else(|| HarvestError::UnknownMethod(s.to_string()))
    }
}

/// Why an adapter produced no transcript.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeouts, dropped connections, throttling. Worth retrying.
    #[error("transient failure: {0}")]
    Transient(String),

    /// The platform definitively has nothing for this method.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("unparsable payload: {0}")]
    Parse(String),

    #[error("transcript too short: {len} chars (min: {min})")]
    TooShort { len: usize, min: usize },
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Text as returned by one adapter, before the shared validation gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTranscript {
    pub text: String,
    pub tier: QualityTier,
    /// Sub-tier tag such as `manual`, `auto` or `translated-vi`.
    pub variant: String,
    pub source_language: Option<String>,
}

impl RawTranscript {
    pub fn new(text: String, tier: QualityTier, variant: impl Into<String>) -> Self {
        Self {
            text,
            tier,
            variant: variant.into(),
            source_language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.source_language = Some(language.into());
        self
    }
}

/// Validated transcript ready for the persistence policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub tier: QualityTier,
    pub method: MethodKind,
    pub variant: String,
    pub source_language: Option<String>,
    pub char_len: usize,
}

impl TranscriptResult {
    /// Returns `None` when `text` is shorter than `coarse_min` characters.
    pub fn new(text: String, method: MethodKind, raw: RawTranscript, coarse_min: usize) -> Option<Self> {
        let len = char_len(&text);
        if len < coarse_min {
            return None;
        }
        Some(Self {
            text,
            tier: raw.tier,
            method,
            variant: raw.variant,
            source_language: raw.source_language,
            char_len: len,
        })
    }

    /// `method/variant`, e.g. `structured/translated-vi`.
    pub fn method_tag(&self) -> String {
        format!("{}/{}", self.method, self.variant)
    }
}

/// One independent transcript retrieval strategy
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptAdapter: Send + Sync {
    /// Which strategy this is
    fn method(&self) -> MethodKind;

    /// Try to obtain a transcript for `video_id`
    async fn fetch(&self, video_id: &str) -> Result<RawTranscript, FetchError>;
}

/// Reject text under an adapter's own acceptance floor.
pub fn ensure_floor(text: String, min_chars: usize) -> Result<String, FetchError> {
    let len = char_len(&text);
    if len < min_chars {
        return Err(FetchError::TooShort { len, min: min_chars });
    }
    Ok(text)
}

/// URLs on the video host, rooted at a configurable base.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: String,
}

impl Endpoints {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn watch(&self, video_id: &str) -> String {
        format!("{}/watch?v={}", self.base, urlencoding::encode(video_id))
    }

    pub fn player(&self, api_key: &str) -> String {
        format!("{}/youtubei/v1/player?key={}", self.base, urlencoding::encode(api_key))
    }

    pub fn track_listing(&self, video_id: &str) -> String {
        format!("{}/api/timedtext?v={}&type=list", self.base, urlencoding::encode(video_id))
    }

    pub fn track(&self, video_id: &str, lang_code: &str, name: &str) -> String {
        let mut url = format!(
            "{}/api/timedtext?v={}&lang={}",
            self.base,
            urlencoding::encode(video_id),
            urlencoding::encode(lang_code)
        );
        if !name.is_empty() {
            url.push_str("&name=");
            url.push_str(&urlencoding::encode(name));
        }
        url
    }

    /// Caption URLs from the page are usually absolute; relative ones hang
    /// off the base.
    pub fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base, url.trim_start_matches('/'))
        }
    }
}

/// Ordered set of enabled adapters
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn TranscriptAdapter>>,
}

impl AdapterRegistry {
    pub fn empty() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Build the adapters named in the configuration, in priority order.
    pub fn from_config(config: &Config, web: Arc<dyn WebClient>) -> Self {
        let acq = &config.acquisition;
        let endpoints = Endpoints::new(&config.http.base_url);
        let floor = acq.adapter_min_chars;

        let mut methods = acq.methods.clone();
        methods.sort();
        methods.dedup();

        let mut registry = Self::empty();
        for method in methods {
            let adapter: Arc<dyn TranscriptAdapter> = match method {
                MethodKind::Structured => Arc::new(structured::StructuredAdapter::new(
                    web.clone(),
                    endpoints.clone(),
                    structured::LanguagePreferences {
                        preferred: acq.languages.clone(),
                        translation_sources: acq.translation_sources.clone(),
                        target: acq.target_language.clone(),
                    },
                    floor,
                )),
                MethodKind::TimedText => Arc::new(timedtext::TimedTextAdapter::new(
                    web.clone(),
                    endpoints.clone(),
                    floor,
                )),
                MethodKind::PageCaptions => Arc::new(page_captions::PageCaptionsAdapter::new(
                    web.clone(),
                    endpoints.clone(),
                    floor,
                )),
                MethodKind::YtDlp => Arc::new(ytdlp::YtDlpAdapter::new(
                    web.clone(),
                    endpoints.clone(),
                    &config.tools,
                    acq.languages.clone(),
                    floor,
                )),
                MethodKind::JsonExtract => Arc::new(json_extract::JsonExtractAdapter::new(
                    web.clone(),
                    endpoints.clone(),
                    floor,
                )),
                MethodKind::Browser => Arc::new(browser::BrowserAdapter::new(
                    web.clone(),
                    endpoints.clone(),
                    &config.tools,
                    floor,
                )),
            };
            registry.register(adapter);
        }

        registry
    }

    /// Append an adapter at the lowest priority
    pub fn register(&mut self, adapter: Arc<dyn TranscriptAdapter>) {
        self.adapters.push(adapter);
    }

    pub fn adapters(&self) -> &[Arc<dyn TranscriptAdapter>] {
        &self.adapters
    }

    pub fn methods(&self) -> Vec<MethodKind> {
        self.adapters.iter().map(|a| a.method()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    pub fn into_adapters(self) -> Vec<Arc<dyn TranscriptAdapter>> {
        self.adapters
    }
}
