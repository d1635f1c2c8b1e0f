use async_trait::async_trait;
use std::sync::Arc;

use super::{ensure_floor, Endpoints, FetchError, MethodKind, QualityTier, RawTranscript, TranscriptAdapter, WebClient};
use crate::parsers::{collapse_whitespace, find_transcript_text, locate_initial_data, Node};

/// Generic JSON-extraction strategy. Searches the page's initial data model
/// for anything that looks like a transcript; last resort before a browser.
pub struct JsonExtractAdapter {
    web: Arc<dyn WebClient>,
    endpoints: Endpoints,
    min_chars: usize,
}

impl JsonExtractAdapter {
    pub fn new(web: Arc<dyn WebClient>, endpoints: Endpoints, min_chars: usize) -> Self {
        Self {
            web,
            endpoints,
            min_chars,
        }
    }
}

#[async_trait]
impl TranscriptAdapter for JsonExtractAdapter {
    fn method(&self) -> MethodKind {
        MethodKind::JsonExtract
    }

    async fn fetch(&self, video_id: &str) -> Result<RawTranscript, FetchError> {
        let html = self.web.get_text(&self.endpoints.watch(video_id)).await?;
        let data = locate_initial_data(&html)
            .ok_or_else(|| FetchError::Parse("no initial data in watch page".to_string()))?;

        let tree = Node::from(data);
        let found = find_transcript_text(&tree)
            .ok_or_else(|| FetchError::NotFound("no transcript-like text in page data".to_string()))?;

        let text = ensure_floor(collapse_whitespace(found), self.min_chars)?;
        Ok(RawTranscript::new(text, QualityTier::BestEffort, "extracted"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::{spoken, FakeWeb};

    fn adapter(web: FakeWeb) -> JsonExtractAdapter {
        JsonExtractAdapter::new(Arc::new(web), Endpoints::new("https://host"), 100)
    }

    #[tokio::test]
    async fn test_extracts_from_initial_data() {
        let text = spoken("text buried in the initial data", 5);
        let html = format!(
            r#"<script>var ytInitialData = {{"engagementPanels": [{{"panel": {{"content": "{}"}}}}]}};</script>"#,
            text
        );
        let web = FakeWeb::new().route("/watch", html);

        let raw = adapter(web).fetch("j").await.unwrap();
        assert_eq!(raw.tier, QualityTier::BestEffort);
        assert_eq!(raw.variant, "extracted");
        assert_eq!(raw.text, text);
    }

    #[tokio::test]
    async fn test_nothing_found() {
        let web = FakeWeb::new().route("/watch", r#"<script>var ytInitialData = {"a": {"text": "short"}};</script>"#);
        assert!(matches!(adapter(web).fetch("j").await, Err(FetchError::NotFound(_))));

        let web = FakeWeb::new().route("/watch", "<html></html>");
        assert!(matches!(adapter(web).fetch("j").await, Err(FetchError::Parse(_))));
    }
}
