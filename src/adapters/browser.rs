use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use super::{ensure_floor, Endpoints, FetchError, MethodKind, QualityTier, RawTranscript, TranscriptAdapter, WebClient};
use crate::config::ToolsConfig;
use crate::parsers::extract_dom_segments;

const URL_PLACEHOLDER: &str = "{url}";

/// Rendered-page strategy. Runs a headless browser (or a driver script
/// wrapping one) that prints the rendered DOM on stdout, then reads the
/// transcript segments out of it.
///
/// The child is spawned with `kill_on_drop`, so a timeout, an error or a
/// cancelled run all take the browser down with the future that owns it.
pub struct BrowserAdapter {
    web: Arc<dyn WebClient>,
    endpoints: Endpoints,
    command: String,
    args: Vec<String>,
    timeout: Duration,
    min_chars: usize,
}

impl BrowserAdapter {
    pub fn new(web: Arc<dyn WebClient>, endpoints: Endpoints, tools: &ToolsConfig, min_chars: usize) -> Self {
        Self {
            web,
            endpoints,
            command: tools.browser_command.clone(),
            args: tools.browser_args.clone(),
            timeout: Duration::from_secs(tools.browser_timeout_secs),
            min_chars,
        }
    }

    /// Substitute `{url}` in the configured arguments, or append the URL
    /// when no argument mentions it.
    pub fn command_args(&self, url: &str) -> Vec<String> {
        let mut args: Vec<String> = self.args.iter().map(|a| a.replace(URL_PLACEHOLDER, url)).collect();
        if !self.args.iter().any(|a| a.contains(URL_PLACEHOLDER)) {
            args.push(url.to_string());
        }
        args
    }

    async fn render(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!("Rendering {} with {}", url, self.command);

        let child = Command::new(&self.command)
            .args(self.command_args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| FetchError::NotFound(format!("browser {} unavailable: {}", self.command, e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FetchError::Transient(format!("browser timed out after {:?}", self.timeout)))?
            .map_err(|e| FetchError::Transient(format!("browser failed: {}", e)))?;

        if !output.status.success() {
            return Err(FetchError::NotFound(format!("browser exited with {}", output.status)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl TranscriptAdapter for BrowserAdapter {
    fn method(&self) -> MethodKind {
        MethodKind::Browser
    }

    async fn fetch(&self, video_id: &str) -> Result<RawTranscript, FetchError> {
        self.web.pace().await;
        let dom = self.render(&self.endpoints.watch(video_id)).await?;
        let text = ensure_floor(extract_dom_segments(&dom), self.min_chars)?;
        Ok(RawTranscript::new(text, QualityTier::BestEffort, "rendered"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::testing::FakeWeb;

    fn adapter(command: &str, args: &[&str], timeout_secs: u64) -> BrowserAdapter {
        let tools = ToolsConfig {
            browser_command: command.to_string(),
            browser_args: args.iter().map(|a| a.to_string()).collect(),
            browser_timeout_secs: timeout_secs,
            ..ToolsConfig::default()
        };
        BrowserAdapter::new(Arc::new(FakeWeb::new()), Endpoints::new("https://host"), &tools, 100)
    }

    #[test]
    fn test_command_args() {
        let templated = adapter("chromium", &["--headless=new", "--dump-dom", "{url}"], 5);
        assert_eq!(
            templated.command_args("https://host/watch?v=a"),
            vec!["--headless=new", "--dump-dom", "https://host/watch?v=a"]
        );

        let appended = adapter("driver.sh", &["--panel"], 5);
        assert_eq!(appended.command_args("u"), vec!["--panel", "u"]);
    }

    #[tokio::test]
    async fn test_missing_browser_is_not_found() {
        let browser = adapter("/nonexistent/browser", &[], 5);
        assert!(matches!(browser.fetch("a").await, Err(FetchError::NotFound(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reads_segments_from_stdout() {
        let segment = "a rendered transcript segment with plenty of words in it";
        let html = format!(
            "<div class=\"segment-text style-scope\">{0}</div><div class=\"segment-text\">{0}</div>",
            segment
        );
        let browser = adapter("sh", &["-c", &format!("printf '%s' '{}'", html), "{url}"], 5);

        let raw = browser.fetch("a").await.unwrap();
        assert_eq!(raw.tier, QualityTier::BestEffort);
        assert_eq!(raw.text, format!("{0} {0}", segment));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_slow_browser_times_out() {
        let browser = adapter("sh", &["-c", "sleep 5", "{url}"], 1);
        assert!(browser.fetch("a").await.unwrap_err().is_transient());
    }
}
