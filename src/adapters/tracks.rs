//! Caption track metadata carried in player configuration documents.

use serde_json::Value;

use super::FetchError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    pub name: String,
    /// `kind == "asr"`: speech-recognition output rather than authored captions
    pub auto_generated: bool,
    pub translatable: bool,
}

/// Read `captions.playerCaptionsTracklistRenderer.captionTracks`.
///
/// Tracks missing a language code or URL are skipped.
pub fn caption_tracks(player: &Value) -> Vec<CaptionTrack> {
    let tracks = player
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .and_then(Value::as_array);

    let Some(tracks) = tracks else {
        return Vec::new();
    };

    tracks
        .iter()
        .filter_map(|track| {
            let language_code = track.get("languageCode")?.as_str()?.to_string();
            let base_url = track.get("baseUrl")?.as_str()?.replace("&fmt=srv3", "");
            let name = track
                .pointer("/name/simpleText")
                .or_else(|| track.pointer("/name/runs/0/text"))
                .and_then(Value::as_str)
                .unwrap_or(&language_code)
                .to_string();

            Some(CaptionTrack {
                base_url,
                language_code,
                name,
                auto_generated: track.get("kind").and_then(Value::as_str) == Some("asr"),
                translatable: track
                    .get("isTranslatable")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            })
        })
        .collect()
}

/// Map a non-OK `playabilityStatus` to a definitive or transient failure.
pub fn check_playability(player: &Value) -> Result<(), FetchError> {
    let Some(status) = player.get("playabilityStatus") else {
        return Ok(());
    };

    let code = status.get("status").and_then(Value::as_str).unwrap_or("OK");
    let reason = status
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or("no reason given");

    match code {
        "OK" => Ok(()),
        "LOGIN_REQUIRED" if reason.contains("not a bot") => {
            Err(FetchError::Transient(format!("request blocked: {}", reason)))
        }
        _ => Err(FetchError::NotFound(format!("video unplayable ({}): {}", code, reason))),
    }
}

/// English-first pick used by the page strategies: the first manual English
/// track, otherwise the last English auto track seen.
pub fn prefer_manual_english(tracks: &[CaptionTrack]) -> Option<&CaptionTrack> {
    let mut chosen = None;
    for track in tracks.iter().filter(|t| t.language_code.starts_with("en")) {
        chosen = Some(track);
        if !track.auto_generated {
            break;
        }
    }
    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn player() -> Value {
        json!({
            "playabilityStatus": {"status": "OK"},
            "captions": {"playerCaptionsTracklistRenderer": {"captionTracks": [
                {"baseUrl": "https://host/api/timedtext?v=a&lang=en&kind=asr&fmt=srv3", "languageCode": "en",
                 "kind": "asr", "name": {"simpleText": "English (auto-generated)"}, "isTranslatable": true},
                {"baseUrl": "https://host/api/timedtext?v=a&lang=en-GB", "languageCode": "en-GB",
                 "name": {"runs": [{"text": "English (UK)"}]}},
                {"languageCode": "fr"}
            ]}}
        })
    }

    #[test]
    fn test_caption_tracks() {
        let tracks = caption_tracks(&player());
        assert_eq!(tracks.len(), 2);
        assert!(tracks[0].auto_generated && tracks[0].translatable);
        assert_eq!(tracks[0].base_url, "https://host/api/timedtext?v=a&lang=en&kind=asr");
        assert_eq!(tracks[1].name, "English (UK)");
        assert!(!tracks[1].auto_generated && !tracks[1].translatable);

        assert!(caption_tracks(&json!({})).is_empty());
        assert!(caption_tracks(&json!({"captions": "nope"})).is_empty());
    }

    #[test]
    fn test_prefer_manual_english() {
        let tracks = caption_tracks(&player());
        assert_eq!(prefer_manual_english(&tracks).unwrap().language_code, "en-GB");
        assert_eq!(prefer_manual_english(&tracks[..1]).unwrap().language_code, "en");
        assert!(prefer_manual_english(&[]).is_none());
    }

    #[test]
    fn test_check_playability() {
        assert!(check_playability(&json!({})).is_ok());
        assert!(check_playability(&player()).is_ok());

        let unavailable = json!({"playabilityStatus": {"status": "ERROR", "reason": "Video unavailable"}});
        assert!(matches!(check_playability(&unavailable), Err(FetchError::NotFound(_))));

        let bot = json!({"playabilityStatus": {"status": "LOGIN_REQUIRED",
            "reason": "Sign in to confirm you're not a bot"}});
        assert!(check_playability(&bot).unwrap_err().is_transient());
    }
}
