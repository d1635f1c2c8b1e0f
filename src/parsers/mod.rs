//! Payload parsers.
//!
//! Every parser here is total: malformed input yields an empty string (or
//! `None` for locators), never an error. Whether an empty parse counts as a
//! failed method is decided by the adapter that called it.

use once_cell::sync::Lazy;
use regex::Regex;

pub mod caption_track;
pub mod json;
pub mod page;
pub mod timed_text;

pub use caption_track::parse_caption_track;
pub use json::{find_transcript_text, Node};
pub use page::{extract_dom_segments, locate_initial_data, locate_player_response};
pub use timed_text::{parse_timed_text, parse_track_listing, ListedTrack};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid tag regex"));

/// Remove inline markup such as `<font color="#fff">` or `<c.colorE5E5E5>`.
pub fn strip_tags(text: &str) -> String {
    TAG_RE.replace_all(text, "").into_owned()
}

/// Collapse every run of whitespace into a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decode the handful of HTML entities caption payloads double-escape.
///
/// Timed-text XML frequently carries `&amp;#39;` which the XML layer turns
/// into `&#39;`; this finishes the job.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    text.replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&quot;", "\"")
        .replace("&#34;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
