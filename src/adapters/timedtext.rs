use async_trait::async_trait;
use std::sync::Arc;

use super::{ensure_floor, Endpoints, FetchError, MethodKind, QualityTier, RawTranscript, TranscriptAdapter, WebClient};
use crate::parsers::{parse_timed_text, parse_track_listing, ListedTrack};

/// Direct timed-text endpoint strategy
pub struct TimedTextAdapter {
    web: Arc<dyn WebClient>,
    endpoints: Endpoints,
    min_chars: usize,
}

impl TimedTextAdapter {
    pub fn new(web: Arc<dyn WebClient>, endpoints: Endpoints, min_chars: usize) -> Self {
        Self {
            web,
            endpoints,
            min_chars,
        }
    }

    /// The first manual English track, otherwise the last English track seen.
    pub fn choose_track(tracks: &[ListedTrack]) -> Option<&ListedTrack> {
        let mut chosen = None;
        for track in tracks.iter().filter(|t| t.is_english()) {
            chosen = Some(track);
            if !track.is_auto() {
                break;
            }
        }
        chosen
    }
}

#[async_trait]
impl TranscriptAdapter for TimedTextAdapter {
    fn method(&self) -> MethodKind {
        MethodKind::TimedText
    }

    async fn fetch(&self, video_id: &str) -> Result<RawTranscript, FetchError> {
        let listing = self.web.get_text(&self.endpoints.track_listing(video_id)).await?;
        let tracks = parse_track_listing(&listing);

        let track = Self::choose_track(&tracks)
            .ok_or_else(|| FetchError::NotFound(format!("no English track among {} listed", tracks.len())))?;

        let url = self.endpoints.track(video_id, &track.lang_code, &track.name);
        let payload = self.web.get_text(&url).await?;
        let text = ensure_floor(parse_timed_text(&payload), self.min_chars)?;

        let (tier, variant) = if track.is_auto() {
            (QualityTier::Auto, "auto")
        } else {
            (QualityTier::Manual, "manual")
        };

        Ok(RawTranscript::new(text, tier, variant).with_language(track.lang_code.clone()))
    }
}
