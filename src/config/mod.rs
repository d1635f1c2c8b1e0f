use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::http::request_period;
use crate::adapters::MethodKind;
use crate::normalize::{DEFAULT_COARSE_MIN_CHARS, DEFAULT_MIN_CHARS};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Outbound HTTP settings
    pub http: HttpConfig,

    /// Retrieval chain and quality thresholds
    pub acquisition: AcquisitionConfig,

    /// Batch pacing
    pub scheduler: SchedulerConfig,

    /// Transcript catalog
    pub storage: StorageConfig,

    /// External programs used by optional methods
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Root of the video host
    pub base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub accept: String,

    /// Per-call timeout
    pub timeout_secs: u64,

    /// Sustained outbound rate shared by every worker
    pub requests_per_second: f64,

    /// Calls allowed back to back before the rate applies
    pub burst: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.youtube.com".to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
            timeout_secs: 10,
            requests_per_second: 1.0,
            burst: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Enabled methods; always run in priority order regardless of listing order
    pub methods: Vec<MethodKind>,

    /// Tries per method on transient errors
    pub max_retries: u32,
    pub retry_delay_ms: u64,

    /// Final acceptance floor after normalization
    pub min_chars: usize,

    /// No result is ever built from shorter text
    pub coarse_min_chars: usize,

    /// Each adapter's own "no transcript" threshold
    pub adapter_min_chars: usize,

    /// Languages accepted without translation, in preference order
    pub languages: Vec<String>,

    /// Source languages for machine translation, in preference order
    pub translation_sources: Vec<String>,
    pub target_language: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            methods: MethodKind::default_enabled(),
            max_retries: 3,
            retry_delay_ms: 1000,
            min_chars: DEFAULT_MIN_CHARS,
            coarse_min_chars: DEFAULT_COARSE_MIN_CHARS,
            adapter_min_chars: DEFAULT_MIN_CHARS,
            languages: ["en", "en-US", "en-GB"].map(String::from).to_vec(),
            translation_sources: ["vi", "es", "fr", "de", "ja", "ko", "zh", "hi", "ar"]
                .map(String::from)
                .to_vec(),
            target_language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub batch_size: usize,
    pub batch_delay_secs: f64,
    pub concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay_secs: 2.0,
            concurrency: 4,
        }
    }
}

impl SchedulerConfig {
    pub fn batch_delay(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.batch_delay_secs).map_err(|_| {
            anyhow::anyhow!(
                "scheduler.batch_delay_secs must be a finite, non-negative number of seconds, got {}",
                self.batch_delay_secs
            )
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite catalog; defaults to the platform data directory
    pub database_path: Option<PathBuf>,

    /// Let a higher tier replace a longer stored transcript
    pub allow_shrink: bool,
}

impl StorageConfig {
    pub fn resolved_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }

        let data_dir = dirs::data_dir().context("Could not determine data directory")?;
        Ok(data_dir.join("caption-harvest").join("catalog.db"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub yt_dlp_path: String,
    pub yt_dlp_timeout_secs: u64,

    /// Headless browser, or a driver script that opens the transcript panel
    /// and prints the rendered DOM
    pub browser_command: String,

    /// `{url}` is replaced by the watch page URL
    pub browser_args: Vec<String>,
    pub browser_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            yt_dlp_timeout_secs: 60,
            browser_command: "chromium".to_string(),
            browser_args: [
                "--headless=new",
                "--disable-gpu",
                "--no-sandbox",
                "--virtual-time-budget=15000",
                "--dump-dom",
                "{url}",
            ]
            .map(String::from)
            .to_vec(),
            browser_timeout_secs: 45,
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let content = fs_err::read_to_string(path).context("Failed to read config file")?;

        let config: Config = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("caption-harvest").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.acquisition.methods.is_empty() {
            anyhow::bail!("At least one acquisition method must be enabled");
        }
        if url::Url::parse(&self.http.base_url).is_err() {
            anyhow::bail!("http.base_url is not a valid URL: {}", self.http.base_url);
        }
        request_period(self.http.requests_per_second).context("Invalid http.requests_per_second")?;
        self.scheduler.batch_delay()?;
        if self.acquisition.coarse_min_chars > self.acquisition.min_chars {
            anyhow::bail!(
                "acquisition.coarse_min_chars ({}) cannot exceed min_chars ({})",
                self.acquisition.coarse_min_chars,
                self.acquisition.min_chars
            );
        }
        if self.scheduler.batch_size == 0 || self.scheduler.concurrency == 0 {
            anyhow::bail!("scheduler.batch_size and scheduler.concurrency must be at least 1");
        }

        Ok(())
    }

    /// Display current configuration
    pub fn display(&self) {
        let methods: Vec<&str> = self.acquisition.methods.iter().map(|m| m.as_str()).collect();

        println!("Current Configuration:");
        println!("  Base URL: {}", self.http.base_url);
        println!("  Timeout: {}s", self.http.timeout_secs);
        println!(
            "  Rate limit: {}/s (burst {})",
            self.http.requests_per_second, self.http.burst
        );
        println!("  Methods: {}", methods.join(", "));
        println!(
            "  Retries: {} (delay {}ms)",
            self.acquisition.max_retries, self.acquisition.retry_delay_ms
        );
        println!("  Min chars: {}", self.acquisition.min_chars);
        println!("  Languages: {}", self.acquisition.languages.join(", "));
        println!(
            "  Translate from: {} -> {}",
            self.acquisition.translation_sources.join(", "),
            self.acquisition.target_language
        );
        println!(
            "  Batches: {} every {}s, {} at a time",
            self.scheduler.batch_size, self.scheduler.batch_delay_secs, self.scheduler.concurrency
        );
        match self.storage.resolved_path() {
            Ok(path) => println!("  Database: {}", path.display()),
            Err(_) => println!("  Database: <unresolved>"),
        }
        println!("  Allow shrink: {}", self.storage.allow_shrink);
    }
}
