use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;
use std::sync::Arc;

use super::tracks::{caption_tracks, check_playability, CaptionTrack};
use super::{ensure_floor, Endpoints, FetchError, MethodKind, QualityTier, RawTranscript, TranscriptAdapter, WebClient};
use crate::parsers::parse_timed_text;

static API_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("valid api key regex")
});

const PLAYER_CLIENT_NAME: &str = "ANDROID";
const PLAYER_CLIENT_VERSION: &str = "20.10.38";

/// Language whitelists for the caption index lookup.
#[derive(Debug, Clone)]
pub struct LanguagePreferences {
    /// Codes accepted as-is, manual tracks first then auto-generated
    pub preferred: Vec<String>,
    /// Fallback source languages for machine translation, tried in order
    pub translation_sources: Vec<String>,
    /// Language translations are requested in
    pub target: String,
}

/// Which track to fetch and how to label the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackChoice<'a> {
    pub track: &'a CaptionTrack,
    pub tier: QualityTier,
    pub translate_to: Option<String>,
}

impl TrackChoice<'_> {
    pub fn variant(&self) -> String {
        match self.tier {
            QualityTier::Manual => "manual".to_string(),
            QualityTier::Auto => "auto".to_string(),
            _ => format!("translated-{}", self.track.language_code),
        }
    }
}

/// Structured caption-listing strategy: asks the player API for the
/// caption index and picks the most trustworthy track it offers.
pub struct StructuredAdapter {
    web: Arc<dyn WebClient>,
    endpoints: Endpoints,
    languages: LanguagePreferences,
    min_chars: usize,
}

impl StructuredAdapter {
    pub fn new(
        web: Arc<dyn WebClient>,
        endpoints: Endpoints,
        languages: LanguagePreferences,
        min_chars: usize,
    ) -> Self {
        Self {
            web,
            endpoints,
            languages,
            min_chars,
        }
    }

    /// Manual track in a preferred language, then an auto-generated one, then
    /// the first translation source language with a translatable track.
    pub fn choose_track<'a>(&self, tracks: &'a [CaptionTrack]) -> Option<TrackChoice<'a>> {
        let find = |code: &str, auto: bool| {
            tracks
                .iter()
                .find(|t| t.language_code == code && t.auto_generated == auto)
        };

        for (auto, tier) in [(false, QualityTier::Manual), (true, QualityTier::Auto)] {
            if let Some(track) = self.languages.preferred.iter().find_map(|code| find(code.as_str(), auto)) {
                return Some(TrackChoice {
                    track,
                    tier,
                    translate_to: None,
                });
            }
        }

        // first match, not best match
        self.languages.translation_sources.iter().find_map(|code| {
            [false, true]
                .into_iter()
                .filter_map(|auto| find(code.as_str(), auto))
                .find(|track| track.translatable)
                .map(|track| TrackChoice {
                    track,
                    tier: QualityTier::Translated,
                    translate_to: Some(self.languages.target.clone()),
                })
        })
    }

    async fn list_tracks(&self, video_id: &str) -> Result<Vec<CaptionTrack>, FetchError> {
        let html = self.web.get_text(&self.endpoints.watch(video_id)).await?;

        let api_key = match API_KEY_RE.captures(&html).and_then(|caps| caps.get(1)) {
            Some(key) => key.as_str().to_string(),
            None if html.contains("g-recaptcha") => {
                return Err(FetchError::Transient("bot check served instead of watch page".to_string()));
            }
            None => return Err(FetchError::Parse("player API key not found in watch page".to_string())),
        };

        let request = json!({
            "context": {
                "client": {
                    "clientName": PLAYER_CLIENT_NAME,
                    "clientVersion": PLAYER_CLIENT_VERSION
                }
            },
            "videoId": video_id
        });

        let player = self.web.post_json(&self.endpoints.player(&api_key), &request).await?;
        check_playability(&player)?;

        let tracks = caption_tracks(&player);
        if tracks.is_empty() {
            return Err(FetchError::NotFound("captions disabled or absent".to_string()));
        }
        Ok(tracks)
    }
}

#[async_trait]
impl TranscriptAdapter for StructuredAdapter {
    fn method(&self) -> MethodKind {
        MethodKind::Structured
    }

    async fn fetch(&self, video_id: &str) -> Result<RawTranscript, FetchError> {
        let tracks = self.list_tracks(video_id).await?;

        let choice = self.choose_track(&tracks).ok_or_else(|| {
            FetchError::NotFound(format!(
                "no track in {:?} or translatable from {:?}",
                self.languages.preferred, self.languages.translation_sources
            ))
        })?;

        let mut url = self.endpoints.resolve(&choice.track.base_url);
        if let Some(target) = &choice.translate_to {
            url.push_str("&tlang=");
            url.push_str(&urlencoding::encode(target));
        }

        tracing::debug!(
            "structured: {} track {} for {}",
            choice.variant(),
            choice.track.language_code,
            video_id
        );

        let payload = self.web.get_text(&url).await?;
        let text = ensure_floor(parse_timed_text(&payload), self.min_chars)?;

        Ok(RawTranscript::new(text, choice.tier, choice.variant())
            .with_language(choice.track.language_code.clone()))
    }
}
