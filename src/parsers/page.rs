//! Watch-page extraction: embedded JSON blobs and rendered transcript DOM.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{collapse_whitespace, decode_entities, strip_tags};

static PLAYER_RESPONSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"ytInitialPlayerResponse"?\]?\s*=\s*"#).expect("valid player response regex")
});

static INITIAL_DATA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"ytInitialData"?\]?\s*=\s*"#).expect("valid initial data regex"));

static SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<[a-z-]+[^>]*class="[^"]*\bsegment-text\b[^"]*"[^>]*>(.*?)</[a-z-]+>"#)
        .expect("valid segment regex")
});

/// Decode the player configuration assigned to `ytInitialPlayerResponse`.
pub fn locate_player_response(html: &str) -> Option<Value> {
    locate_assignment(html, &PLAYER_RESPONSE_RE)
}

/// Decode the page model assigned to `ytInitialData`.
pub fn locate_initial_data(html: &str) -> Option<Value> {
    locate_assignment(html, &INITIAL_DATA_RE)
}

/// Every assignment site is tried in order; the first one that decodes as a
/// JSON object wins. Decoding streams exactly one value from the `=` sign, so
/// whatever script follows the literal is ignored.
fn locate_assignment(html: &str, marker: &Regex) -> Option<Value> {
    marker.find_iter(html).find_map(|m| {
        let mut values = serde_json::Deserializer::from_str(&html[m.end()..]).into_iter::<Value>();
        match values.next() {
            Some(Ok(value @ Value::Object(_))) => Some(value),
            _ => None,
        }
    })
}

/// Join the text of rendered transcript segments found in page HTML.
pub fn extract_dom_segments(html: &str) -> String {
    let segments: Vec<String> = SEGMENT_RE
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|inner| collapse_whitespace(&decode_entities(&strip_tags(inner.as_str()))))
        .filter(|text| !text.is_empty())
        .collect();

    segments.join(" ")
}
