//! The single quality gate every adapter result passes through.

use thiserror::Error;

use crate::parsers::{collapse_whitespace, strip_tags};

/// Default minimum transcript length, in characters, for final acceptance.
pub const DEFAULT_MIN_CHARS: usize = 100;

/// Below this length no transcript result is ever constructed.
pub const DEFAULT_COARSE_MIN_CHARS: usize = 50;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("transcript too short: {len} chars (min: {min})")]
    TooShort { len: usize, min: usize },
}

/// Normalizes candidate text and rejects anything under the length floor.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    min_chars: usize,
}

impl Validator {
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    /// Normalize `text` and check it against the floor.
    pub fn validate(&self, text: &str) -> Result<String, ValidationError> {
        let normalized = normalize(text);
        let len = char_len(&normalized);
        if len < self.min_chars {
            return Err(ValidationError::TooShort {
                len,
                min: self.min_chars,
            });
        }
        Ok(normalized)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_CHARS)
    }
}

/// Strip markup and disallowed characters, then collapse whitespace.
pub fn normalize(text: &str) -> String {
    let untagged = strip_tags(text);
    let cleaned: String = untagged
        .chars()
        .filter_map(|c| {
            if c.is_control() {
                Some(' ')
            } else if is_disallowed(c) {
                None
            } else {
                Some(c)
            }
        })
        .collect();
    collapse_whitespace(&cleaned)
}

/// Length in characters, the unit every threshold is expressed in.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn is_disallowed(c: char) -> bool {
    matches!(
        c,
        '\u{200B}'..='\u{200F}'
            | '\u{2028}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{FEFF}'
            | '\u{FFFC}'
            | '\u{FFFD}'
            | '\u{E000}'..='\u{F8FF}'
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_and_collapses() {
        let raw = "\u{FEFF}  <i>Hello</i>\u{200B} there\r\n\tgeneral\u{0007} kenobi \u{FFFD}\u{E001} ";
        assert_eq!(normalize(raw), "Hello there general kenobi");
    }

    #[test]
    fn test_normalize_keeps_unicode_text() {
        assert_eq!(normalize("xin chào  các bạn ♪"), "xin chào các bạn ♪");
    }

    #[test]
    fn test_validate_floor() {
        let validator = Validator::new(10);
        assert_eq!(validator.validate("  twelve chars  ").unwrap(), "twelve chars");
        assert_eq!(
            validator.validate("<b>short</b>"),
            Err(ValidationError::TooShort { len: 5, min: 10 })
        );
    }

    #[test]
    fn test_validate_counts_chars_not_bytes() {
        let validator = Validator::new(5);
        assert!(validator.validate("ああああ").is_err());
        assert!(validator.validate("あああああ").is_ok());
    }

    #[test]
    fn test_accepted_text_always_meets_floor() {
        let validator = Validator::default();
        let fragments = ["a", " ", "<p>", "\u{200B}", "word ", "\n\n", "éé", "<br/>", "\u{0}"];

        // Deterministic pseudo-random mixes of markup, garbage and text.
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        for _ in 0..500 {
            let mut text = String::new();
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let pieces = (seed % 200) as usize;
            for i in 0..pieces {
                let idx = ((seed >> (i % 48)) as usize + i) % fragments.len();
                text.push_str(fragments[idx]);
            }

            if let Ok(accepted) = validator.validate(&text) {
                assert!(char_len(&accepted) >= validator.min_chars());
                assert_eq!(accepted, normalize(&accepted));
            }
        }
    }
}
