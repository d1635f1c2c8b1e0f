use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::adapters::MethodKind;

#[derive(Parser)]
#[command(
    name = "caption-harvest",
    about = "Caption Harvest - Fill a video catalog with transcripts from captions and page data",
    version,
    long_about = "Tries an ordered chain of caption retrieval methods for every catalog video that lacks a usable transcript, validates what comes back and stores it without ever replacing a better transcript with a worse one."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// SQLite catalog to use instead of the configured one
    #[arg(long, global = true, value_name = "FILE", env = "CAPTION_HARVEST_DB")]
    pub database: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch transcripts for catalog videos that lack one
    Fetch {
        /// Videos per batch
        #[arg(short, long, value_name = "N")]
        batch_size: Option<usize>,

        /// Seconds to pause between batches
        #[arg(short, long, value_name = "SECS")]
        delay: Option<f64>,

        /// Process at most this many videos
        #[arg(short, long, value_name = "N")]
        limit: Option<usize>,

        /// Minimum transcript length in characters
        #[arg(short, long, value_name = "CHARS")]
        min_chars: Option<usize>,

        /// Videos processed at the same time within a batch
        #[arg(short, long, value_name = "N")]
        concurrency: Option<usize>,

        /// Revisit videos that already have a transcript so better tiers can replace it
        #[arg(long)]
        refresh: bool,

        /// Let a higher tier replace a longer stored transcript
        #[arg(long)]
        allow_shrink: bool,

        /// Comma-separated methods to enable (see `methods`)
        #[arg(long, value_delimiter = ',', value_name = "LIST")]
        methods: Option<Vec<MethodKind>>,
    },

    /// Run the retrieval chain for one video without storing anything
    Probe {
        /// Video id or watch URL
        #[arg(value_name = "VIDEO")]
        video: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Comma-separated methods to enable
        #[arg(long, value_delimiter = ',', value_name = "LIST")]
        methods: Option<Vec<MethodKind>>,
    },

    /// Report transcript coverage of the catalog
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Add videos to the catalog from a JSON or YAML list
    Import {
        /// File holding a list of {video_id, title, channel_name, view_count}
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// List retrieval methods in priority order
    Methods,

    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_flags() {
        let cli = Cli::parse_from([
            "caption-harvest",
            "fetch",
            "-b",
            "5",
            "--delay",
            "0.5",
            "--methods",
            "timedtext,page-captions",
            "--refresh",
        ]);

        match cli.command {
            Commands::Fetch {
                batch_size,
                delay,
                methods,
                refresh,
                ..
            } => {
                assert_eq!(batch_size, Some(5));
                assert_eq!(delay, Some(0.5));
                assert_eq!(methods, Some(vec![MethodKind::TimedText, MethodKind::PageCaptions]));
                assert!(refresh);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_unknown_method_is_rejected() {
        assert!(Cli::try_parse_from(["caption-harvest", "fetch", "--methods", "selenium"]).is_err());
    }
}
