use async_trait::async_trait;
use std::sync::Arc;

use super::tracks::{caption_tracks, check_playability, prefer_manual_english};
use super::{ensure_floor, Endpoints, FetchError, MethodKind, QualityTier, RawTranscript, TranscriptAdapter, WebClient};
use crate::parsers::{locate_player_response, parse_timed_text};

/// Embedded-page-data strategy: caption tracks listed in the player
/// configuration baked into the watch page.
pub struct PageCaptionsAdapter {
    web: Arc<dyn WebClient>,
    endpoints: Endpoints,
    min_chars: usize,
}

impl PageCaptionsAdapter {
    pub fn new(web: Arc<dyn WebClient>, endpoints: Endpoints, min_chars: usize) -> Self {
        Self {
            web,
            endpoints,
            min_chars,
        }
    }
}

#[async_trait]
impl TranscriptAdapter for PageCaptionsAdapter {
    fn method(&self) -> MethodKind {
        MethodKind::PageCaptions
    }

    async fn fetch(&self, video_id: &str) -> Result<RawTranscript, FetchError> {
        let html = self.web.get_text(&self.endpoints.watch(video_id)).await?;
        let player = locate_player_response(&html)
            .ok_or_else(|| FetchError::Parse("no player configuration in watch page".to_string()))?;
        check_playability(&player)?;

        let tracks = caption_tracks(&player);
        let track = prefer_manual_english(&tracks)
            .ok_or_else(|| FetchError::NotFound(format!("no English track among {} in page", tracks.len())))?;

        let payload = self.web.get_text(&self.endpoints.resolve(&track.base_url)).await?;
        let text = ensure_floor(parse_timed_text(&payload), self.min_chars)?;

        let (tier, variant) = if track.auto_generated {
            (QualityTier::Auto, "auto")
        } else {
            (QualityTier::Manual, "manual")
        };

        Ok(RawTranscript::new(text, tier, variant).with_language(track.language_code.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{spoken, timed_text_xml, watch_page, FakeWeb};
    use serde_json::json;

    fn adapter(web: FakeWeb) -> PageCaptionsAdapter {
        PageCaptionsAdapter::new(Arc::new(web), Endpoints::new("https://host"), 100)
    }

    #[tokio::test]
    async fn test_fetch_prefers_manual_track() {
        let text = spoken("captions pulled from the page configuration", 4);
        let player = json!({"captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
            {"baseUrl": "/api/timedtext?v=p&lang=en&kind=asr", "languageCode": "en", "kind": "asr"},
            {"baseUrl": "/api/timedtext?v=p&lang=en", "languageCode": "en"}
        ]}}});
        let web = FakeWeb::new()
            .route("/watch?v=p", watch_page(&player))
            .route("https://host/api/timedtext?v=p&lang=en&kind=asr", timed_text_xml(&["auto text"]))
            .route("https://host/api/timedtext?v=p&lang=en", timed_text_xml(&[&text]));

        let raw = adapter(web).fetch("p").await.unwrap();
        assert_eq!(raw.tier, QualityTier::Manual);
        assert_eq!(raw.text, text);
    }

    #[tokio::test]
    async fn test_empty_payload_is_too_short() {
        let player = json!({"captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
            {"baseUrl": "https://host/api/timedtext?v=p&lang=en", "languageCode": "en"}
        ]}}});
        let web = FakeWeb::new()
            .route("/watch", watch_page(&player))
            .route("/api/timedtext", "<transcript></transcript>");

        assert_eq!(
            adapter(web).fetch("p").await,
            Err(FetchError::TooShort { len: 0, min: 100 })
        );
    }

    #[tokio::test]
    async fn test_page_without_player_is_parse_error() {
        let web = FakeWeb::new().route("/watch", "<html></html>");
        assert!(matches!(adapter(web).fetch("p").await, Err(FetchError::Parse(_))));
    }
}
