use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use super::{ensure_floor, Endpoints, FetchError, MethodKind, QualityTier, RawTranscript, TranscriptAdapter, WebClient};
use crate::config::ToolsConfig;
use crate::parsers::{parse_caption_track, parse_timed_text};

/// A subtitle rendition reported by yt-dlp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleChoice {
    pub url: String,
    pub ext: String,
    pub language: String,
    pub tier: QualityTier,
}

/// Subtitle fallback using yt-dlp metadata
pub struct YtDlpAdapter {
    web: Arc<dyn WebClient>,
    endpoints: Endpoints,
    yt_dlp_path: String,
    timeout: Duration,
    languages: Vec<String>,
    min_chars: usize,
}

impl YtDlpAdapter {
    pub fn new(
        web: Arc<dyn WebClient>,
        endpoints: Endpoints,
        tools: &ToolsConfig,
        languages: Vec<String>,
        min_chars: usize,
    ) -> Self {
        Self {
            web,
            endpoints,
            yt_dlp_path: tools.yt_dlp_path.clone(),
            timeout: Duration::from_secs(tools.yt_dlp_timeout_secs),
            languages,
            min_chars,
        }
    }

    /// Pick a rendition from `--dump-json` output: uploaded subtitles in any
    /// preferred language first, then automatic captions. VTT is preferred
    /// within a language.
    pub fn choose_subtitle(info: &Value, languages: &[String]) -> Option<SubtitleChoice> {
        for (section, tier) in [("subtitles", QualityTier::Manual), ("automatic_captions", QualityTier::Auto)] {
            for language in languages {
                let Some(renditions) = info.get(section).and_then(|s| s.get(language)).and_then(Value::as_array)
                else {
                    continue;
                };

                let with_url = |r: &&Value| r.get("url").and_then(Value::as_str).is_some();
                let picked = renditions
                    .iter()
                    .filter(with_url)
                    .find(|r| r.get("ext").and_then(Value::as_str) == Some("vtt"))
                    .or_else(|| renditions.iter().find(with_url));

                if let Some(rendition) = picked {
                    return Some(SubtitleChoice {
                        url: rendition["url"].as_str().unwrap_or_default().to_string(),
                        ext: rendition
                            .get("ext")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string(),
                        language: language.clone(),
                        tier,
                    });
                }
            }
        }
        None
    }

    async fn dump_info(&self, video_id: &str) -> Result<Value, FetchError> {
        let url = self.endpoints.watch(video_id);
        tracing::debug!("Running {} for: {}", self.yt_dlp_path, url);

        let child = Command::new(&self.yt_dlp_path)
            .args(["--dump-json", "--skip-download", "--no-playlist", "--no-warnings", &url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::NotFound(format!("{} unavailable: {}", self.yt_dlp_path, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FetchError::Transient(format!("yt-dlp timed out after {:?}", self.timeout)))?
            .map_err(|e| FetchError::Transient(format!("yt-dlp failed: {}", e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(classify_failure(&error));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| FetchError::Parse(format!("yt-dlp output: {}", e)))
    }
}

fn classify_failure(stderr: &str) -> FetchError {
    let message = stderr.lines().last().unwrap_or("no output").trim().to_string();
    let lower = stderr.to_lowercase();
    if lower.contains("429") || lower.contains("timed out") {
        FetchError::Transient(format!("yt-dlp failed: {}", message))
    } else {
        FetchError::NotFound(format!("yt-dlp failed: {}", message))
    }
}

#[async_trait]
impl TranscriptAdapter for YtDlpAdapter {
    fn method(&self) -> MethodKind {
        MethodKind::YtDlp
    }

    async fn fetch(&self, video_id: &str) -> Result<RawTranscript, FetchError> {
        self.web.pace().await;
        let info = self.dump_info(video_id).await?;

        let choice = Self::choose_subtitle(&info, &self.languages)
            .ok_or_else(|| FetchError::NotFound("yt-dlp reports no usable subtitles".to_string()))?;

        let payload = self.web.get_text(&choice.url).await?;
        let parsed = if payload.trim_start().starts_with('<') {
            parse_timed_text(&payload)
        } else {
            parse_caption_track(&payload)
        };
        let text = ensure_floor(parsed, self.min_chars)?;

        let variant = match choice.tier {
            QualityTier::Manual => "manual",
            _ => "auto",
        };
        Ok(RawTranscript::new(text, choice.tier, variant).with_language(choice.language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn langs() -> Vec<String> {
        vec!["en".to_string(), "en-US".to_string()]
    }

    #[test]
    fn test_choose_prefers_uploaded_vtt() {
        let info = json!({
            "subtitles": {"en-US": [
                {"ext": "json3", "url": "https://subs/json3"},
                {"ext": "vtt", "url": "https://subs/vtt"}
            ]},
            "automatic_captions": {"en": [{"ext": "vtt", "url": "https://auto/vtt"}]}
        });

        let choice = YtDlpAdapter::choose_subtitle(&info, &langs()).unwrap();
        assert_eq!(choice.url, "https://subs/vtt");
        assert_eq!(choice.tier, QualityTier::Manual);
        assert_eq!(choice.language, "en-US");
    }

    #[test]
    fn test_choose_falls_back_to_automatic() {
        let info = json!({
            "subtitles": {"fr": [{"ext": "vtt", "url": "https://subs/fr"}]},
            "automatic_captions": {"en": [{"ext": "srv3", "url": "https://auto/srv3"}, {"ext": "ttml"}]}
        });

        let choice = YtDlpAdapter::choose_subtitle(&info, &langs()).unwrap();
        assert_eq!(choice.tier, QualityTier::Auto);
        assert_eq!(choice.ext, "srv3");

        assert!(YtDlpAdapter::choose_subtitle(&json!({"title": "x"}), &langs()).is_none());
    }

    #[test]
    fn test_classify_failure() {
        assert!(classify_failure("ERROR: HTTP Error 429: Too Many Requests").is_transient());
        assert!(matches!(
            classify_failure("ERROR: [youtube] x: Private video"),
            FetchError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_missing_binary_is_not_found() {
        let tools = ToolsConfig {
            yt_dlp_path: "/nonexistent/yt-dlp-binary".to_string(),
            ..ToolsConfig::default()
        };
        let adapter = YtDlpAdapter::new(
            Arc::new(crate::adapters::testing::FakeWeb::new()),
            Endpoints::new("https://host"),
            &tools,
            langs(),
            100,
        );

        assert!(matches!(adapter.fetch("abc").await, Err(FetchError::NotFound(_))));
    }
}
