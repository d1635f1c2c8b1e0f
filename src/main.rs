use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use caption_harvest::adapters::http::{build_limiter, HttpClient};
use caption_harvest::adapters::MethodKind;
use caption_harvest::cli::{Cli, Commands};
use caption_harvest::config::Config;
use caption_harvest::output;
use caption_harvest::persist::PersistencePolicy;
use caption_harvest::scheduler::{Scheduler, SchedulerSettings, StopSignal};
use caption_harvest::store::{SqliteStore, TranscriptStore, VideoCandidate};
use caption_harvest::utils;
use caption_harvest::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let mut config = Config::load().await?;
    if let Some(path) = &cli.database {
        config.storage.database_path = Some(path.clone());
    }

    match cli.command {
        Commands::Fetch {
            batch_size,
            delay,
            limit,
            min_chars,
            concurrency,
            refresh,
            allow_shrink,
            methods,
        } => {
            if let Some(methods) = methods {
                config.acquisition.methods = methods;
            }
            if let Some(min_chars) = min_chars {
                config.acquisition.min_chars = min_chars;
                config.acquisition.coarse_min_chars = config.acquisition.coarse_min_chars.min(min_chars);
            }
            if let Some(batch_size) = batch_size {
                config.scheduler.batch_size = batch_size;
            }
            if let Some(delay) = delay {
                config.scheduler.batch_delay_secs = delay;
            }
            if let Some(concurrency) = concurrency {
                config.scheduler.concurrency = concurrency;
            }
            config.storage.allow_shrink |= allow_shrink;
            config.validate()?;

            warn_missing_tools(&config).await;

            let store = open_store(&config)?;
            let orchestrator = Arc::new(build_orchestrator(&config)?);

            let stop = StopSignal::new();
            let on_interrupt = stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted: finishing in-flight videos, starting no new ones");
                    on_interrupt.stop();
                }
            });

            let settings = SchedulerSettings {
                batch_size: config.scheduler.batch_size,
                batch_delay: config.scheduler.batch_delay()?,
                concurrency: config.scheduler.concurrency,
                limit,
                refresh,
                show_progress: !cli.quiet,
            };
            let policy = PersistencePolicy::new(config.acquisition.min_chars, config.storage.allow_shrink);

            tracing::info!(
                "Methods: {}",
                orchestrator
                    .methods()
                    .iter()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(" > ")
            );

            let scheduler = Scheduler::new(orchestrator, store, policy, settings, stop);
            let stats = scheduler.run().await?;
            stats.log_summary();
        }
        Commands::Probe {
            video,
            format,
            output,
            methods,
        } => {
            if let Some(methods) = methods {
                config.acquisition.methods = methods;
            }
            config.validate()?;
            warn_missing_tools(&config).await;

            let video_id = utils::extract_video_id(&video)?;
            let orchestrator = build_orchestrator(&config)?;

            tracing::info!("Probing {}", video_id);
            let outcome = orchestrator.acquire(&video_id).await;
            let content = output::format_probe(&video_id, &outcome, &format)?;

            match output {
                Some(path) => {
                    output::save_to_file(&content, &path)?;
                    println!("Probe result saved to: {}", path.display());
                }
                None => output::print_to_console(&content),
            }
        }
        Commands::Status { format } => {
            let store = open_store(&config)?;
            let report = store.status_report().await?;
            output::print_to_console(&output::format_status(&report, &format)?);
        }
        Commands::Import { file } => {
            let videos = read_catalog(&file)?;
            let store = open_store(&config)?;
            let imported = store.import_videos(&videos).await?;
            println!("Imported {} videos from {}", imported, file.display());
        }
        Commands::Methods => {
            println!("Retrieval methods, highest priority first:");
            for method in MethodKind::ALL {
                let marker = if config.acquisition.methods.contains(&method) {
                    "*"
                } else {
                    " "
                };
                println!("  {} {:<14} {}", marker, method.as_str(), method.description());
            }
            println!("(* enabled in the current configuration)");
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Edit the config file to change settings:");
                println!("  {}", Config::config_path()?.display());
            }
        }
    }

    Ok(())
}

fn init_tracing(cli: &Cli) {
    let default_filter = if cli.verbose {
        "caption_harvest=debug"
    } else if cli.quiet {
        "caption_harvest=warn"
    } else {
        "caption_harvest=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    let registry = tracing_subscriber::registry().with(filter);

    if cli.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let limiter = build_limiter(config.http.requests_per_second, config.http.burst)?;
    let web = Arc::new(HttpClient::new(&config.http, limiter)?);
    Ok(Orchestrator::from_config(config, web)?)
}

fn open_store(config: &Config) -> Result<Arc<dyn TranscriptStore>> {
    let path = config.storage.resolved_path()?;
    tracing::debug!("Opening catalog at {}", path.display());
    let store = SqliteStore::open(&path).with_context(|| format!("Failed to open catalog {}", path.display()))?;
    Ok(Arc::new(store))
}

async fn warn_missing_tools(config: &Config) {
    let missing = utils::check_dependencies(&config.acquisition.methods, &config.tools).await;
    if !missing.is_empty() {
        eprintln!("{}", console::style("Dependency check warnings:").yellow());
        for dep in missing {
            eprintln!("   • {}", dep);
        }
        eprintln!("   (Methods needing them will report no transcript)");
    }
}

/// Catalog seed files are a JSON or YAML list of videos.
fn read_catalog(path: &Path) -> Result<Vec<VideoCandidate>> {
    let content = fs_err::read_to_string(path).context("Failed to read catalog file")?;
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    let videos: Vec<VideoCandidate> = if is_json {
        serde_json::from_str(&content).context("Failed to parse JSON catalog")?
    } else {
        serde_yaml::from_str(&content).context("Failed to parse YAML catalog")?
    };

    if let Some(bad) = videos.iter().find(|v| v.video_id.trim().is_empty()) {
        anyhow::bail!("Catalog entry without a video_id: {:?}", bad);
    }
    Ok(videos)
}
