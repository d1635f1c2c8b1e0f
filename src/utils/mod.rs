use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use url::Url;

use crate::adapters::MethodKind;
use crate::config::ToolsConfig;
use crate::HarvestError;

static VIDEO_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{6,64}$").expect("valid video id regex"));

/// Accept a bare id or any common watch URL form and return the id.
pub fn extract_video_id(input: &str) -> Result<String, HarvestError> {
    let input = input.trim();
    if VIDEO_ID_RE.is_match(input) {
        return Ok(input.to_string());
    }

    let invalid = || HarvestError::InvalidVideoId(input.to_string());
    let parsed = Url::parse(input).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }

    let host = parsed.host_str().unwrap_or_default().trim_start_matches("www.");
    let candidate = if host == "youtu.be" {
        parsed.path_segments().and_then(|mut s| s.next()).map(str::to_string)
    } else if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "v") {
        Some(v.into_owned())
    } else {
        // /embed/<id>, /shorts/<id>, /v/<id>, /live/<id>
        let segments: Vec<&str> = parsed.path_segments().map(|s| s.collect()).unwrap_or_default();
        match segments.as_slice() {
            ["embed" | "shorts" | "v" | "live", id, ..] => Some(id.to_string()),
            _ => None,
        }
    };

    candidate.filter(|id| VIDEO_ID_RE.is_match(id)).ok_or_else(invalid)
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs_f64();
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, secs)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, secs)
    } else if total_seconds >= 10 {
        format!("{}s", secs)
    } else {
        format!("{:.1}s", seconds)
    }
}

/// Shorten a title for log lines, on a character boundary.
pub fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let kept: String = title.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Check that external tools needed by the enabled methods are present
pub async fn check_dependencies(methods: &[MethodKind], tools: &ToolsConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if methods.contains(&MethodKind::YtDlp) && !check_command_available(&tools.yt_dlp_path).await {
        missing.push(format!("{} - required by the yt_dlp method", tools.yt_dlp_path));
    }

    if methods.contains(&MethodKind::Browser) && !check_command_available(&tools.browser_command).await {
        missing.push(format!("{} - required by the browser method", tools.browser_command));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str) -> bool {
    use tokio::process::Command;

    Command::new(command)
        .arg("--version")
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
