//! Canned-payload web client for adapter and scenario tests.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;

use super::{FetchError, WebClient};

/// Answers requests from a list of `(url fragment, response)` routes; the
/// first route whose fragment occurs in the URL wins. Unrouted URLs are 404s.
#[derive(Default)]
pub struct FakeWeb {
    routes: Vec<(String, Result<String, FetchError>)>,
    calls: Mutex<Vec<String>>,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, fragment: &str, body: impl Into<String>) -> Self {
        self.routes.push((fragment.to_string(), Ok(body.into())));
        self
    }

    pub fn fail(mut self, fragment: &str, error: FetchError) -> Self {
        self.routes.push((fragment.to_string(), Err(error)));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, fragment: &str) -> usize {
        self.calls().iter().filter(|url| url.contains(fragment)).count()
    }

    fn respond(&self, url: &str) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.routes
            .iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| Err(FetchError::NotFound(format!("HTTP 404 from {}", url))))
    }
}

#[async_trait]
impl WebClient for FakeWeb {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        self.respond(url)
    }

    async fn post_json(&self, url: &str, _body: &Value) -> Result<Value, FetchError> {
        let body = self.respond(url)?;
        serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))
    }

    async fn pace(&self) {}
}

/// A sentence long enough to clear every default floor when repeated.
pub fn spoken(words: &str, times: usize) -> String {
    vec![words; times].join(" ")
}

/// Classic timed-text document with one `<text>` element per line.
pub fn timed_text_xml(lines: &[&str]) -> String {
    let body: String = lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("<text start=\"{}\" dur=\"1.0\">{}</text>", i, line))
        .collect();
    format!("<?xml version=\"1.0\" encoding=\"utf-8\" ?><transcript>{}</transcript>", body)
}

/// Watch page embedding an API key and the given player response.
pub fn watch_page(player_response: &Value) -> String {
    format!(
        "<html><script>ytcfg.set({{\"INNERTUBE_API_KEY\": \"test-key_123\"}});</script>\
         <script>var ytInitialPlayerResponse = {};var meta = {{}};</script></html>",
        player_response
    )
}
