//! Timed-text XML payloads.
//!
//! Two shapes show up in practice:
//! ```xml
//! <transcript>
//!   <text start="0.5" dur="2.1">Hello &amp;#39;world&amp;#39;</text>
//! </transcript>
//! ```
//! and the srv3 layout, where each `<p>` holds `<s>` word segments.

use super::{collapse_whitespace, decode_entities, strip_tags};

/// Caption track advertised by the `type=list` timed-text endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedTrack {
    pub lang_code: String,
    pub name: String,
    pub lang_original: Option<String>,
}

impl ListedTrack {
    /// Auto-generated tracks advertise themselves through their display name.
    pub fn is_auto(&self) -> bool {
        self.name.to_lowercase().contains("auto")
    }

    pub fn is_english(&self) -> bool {
        self.lang_code.starts_with("en")
            || self.name.contains("English")
            || self
                .lang_original
                .as_deref()
                .is_some_and(|original| original.contains("English"))
    }
}

/// Extract the spoken text from a timed-text XML document.
///
/// Returns an empty string for malformed XML or a document without caption
/// elements.
pub fn parse_timed_text(xml: &str) -> String {
    let xml = xml.trim().trim_start_matches('\u{feff}');
    let doc = match roxmltree::Document::parse(xml) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("Timed-text XML parse error: {}", e);
            return String::new();
        }
    };

    let segments: Vec<String> = doc
        .descendants()
        .filter(|n| n.is_element() && matches!(n.tag_name().name(), "text" | "p"))
        .filter_map(|element| {
            let raw: String = element
                .descendants()
                .filter(|n| n.is_text())
                .filter_map(|n| n.text())
                .collect();
            let cleaned = collapse_whitespace(&strip_tags(&decode_entities(&raw)));
            (!cleaned.is_empty()).then_some(cleaned)
        })
        .collect();

    collapse_whitespace(&segments.join(" "))
}

/// Parse the track listing returned by `timedtext?type=list`.
pub fn parse_track_listing(xml: &str) -> Vec<ListedTrack> {
    let doc = match roxmltree::Document::parse(xml.trim()) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!("Track listing parse error: {}", e);
            return Vec::new();
        }
    };

    doc.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "track")
        .filter_map(|track| {
            let lang_code = track.attribute("lang_code")?.to_string();
            Some(ListedTrack {
                lang_code,
                name: track.attribute("name").unwrap_or_default().to_string(),
                lang_original: track.attribute("lang_original").map(str::to_string),
            })
        })
        .collect()
}
