//! WebVTT / SRT caption track text.

use super::{collapse_whitespace, decode_entities, strip_tags};

const HEADER_PREFIXES: &[&str] = &["WEBVTT", "NOTE", "Kind:", "Language:", "STYLE", "REGION"];

/// Reduce a VTT or SRT document to its spoken text.
///
/// Cue timings, sequence numbers, headers and markup-only lines are dropped.
/// Rolling auto-captions repeat the previous line in every cue, so a line
/// identical to the one kept just before it is skipped too.
pub fn parse_caption_track(content: &str) -> String {
    let mut kept: Vec<String> = Vec::new();

    for line in content.lines() {
        let line = line.trim().trim_start_matches('\u{feff}');

        if line.is_empty()
            || line.contains("-->")
            || line.chars().all(|c| c.is_ascii_digit())
            || HEADER_PREFIXES.iter().any(|prefix| line.starts_with(prefix))
        {
            continue;
        }

        let text = collapse_whitespace(&strip_tags(&decode_entities(line)));
        if text.chars().count() <= 2 {
            continue;
        }

        if kept.last() != Some(&text) {
            kept.push(text);
        }
    }

    collapse_whitespace(&kept.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vtt() {
        let vtt = "WEBVTT\nKind: captions\nLanguage: en\n\n\
                   00:00:00.000 --> 00:00:02.000 align:start position:0%\n\
                   hello<00:00:00.500><c> everyone</c>\n\n\
                   00:00:02.000 --> 00:00:04.000\n\
                   hello everyone\n\
                   and welcome back\n\n\
                   NOTE this is a comment\n\n\
                   00:00:04.000 --> 00:00:06.000\n\
                   <c></c>\n\
                   ok\n";

        assert_eq!(parse_caption_track(vtt), "hello everyone and welcome back");
    }

    #[test]
    fn test_parse_srt() {
        let srt = "1\n00:00:01,000 --> 00:00:03,000\nFirst line of dialogue\n\n\
                   2\n00:00:03,500 --> 00:00:05,000\nSecond   line\nwith wrap\n";

        assert_eq!(
            parse_caption_track(srt),
            "First line of dialogue Second line with wrap"
        );
    }

    #[test]
    fn test_garbage_is_total() {
        assert_eq!(parse_caption_track(""), "");
        assert_eq!(parse_caption_track("12\n34\n-->\n<b></b>"), "");
        assert_eq!(parse_caption_track("\u{0}\u{1}"), "");
    }
}
