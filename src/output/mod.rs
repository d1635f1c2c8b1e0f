use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::acquire::{AcquisitionAttempt, AttemptOutcome, Outcome};
use crate::adapters::TranscriptResult;
use crate::cli::OutputFormat;
use crate::store::StatusReport;
use crate::utils::truncate_title;

#[derive(Serialize)]
struct ProbeReport<'a> {
    video_id: &'a str,
    acquired: bool,
    result: Option<&'a TranscriptResult>,
    attempts: &'a [AcquisitionAttempt],
}

/// Render a probe outcome
pub fn format_probe(video_id: &str, outcome: &Outcome, format: &OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let report = ProbeReport {
                video_id,
                acquired: outcome.result().is_some(),
                result: outcome.result(),
                attempts: outcome.attempts(),
            };
            Ok(serde_json::to_string_pretty(&report)?)
        }
        OutputFormat::Text => Ok(probe_as_text(video_id, outcome)),
    }
}

fn probe_as_text(video_id: &str, outcome: &Outcome) -> String {
    let mut out = format!("Video: {}\n", video_id);

    for attempt in outcome.attempts() {
        let status = match &attempt.outcome {
            AttemptOutcome::Success => "ok".to_string(),
            AttemptOutcome::Failure { reason } => format!("miss: {}", reason),
            AttemptOutcome::Error { reason } => format!("error: {}", reason),
        };
        out.push_str(&format!(
            "  {:<14} #{} {:>6}ms  {}\n",
            attempt.method.as_str(),
            attempt.attempt,
            attempt.elapsed_ms,
            status
        ));
    }

    match outcome.result() {
        Some(result) => {
            out.push_str(&format!(
                "Method: {}  Tier: {}  Length: {} chars\n",
                result.method_tag(),
                result.tier,
                result.char_len
            ));
            if let Some(language) = &result.source_language {
                out.push_str(&format!("Source language: {}\n", language));
            }
            out.push('\n');
            out.push_str(&result.text);
        }
        None => out.push_str("No transcript found"),
    }

    out
}

/// Render a catalog status report
pub fn format_status(report: &StatusReport, format: &OutputFormat) -> Result<String> {
    if *format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(report)?);
    }

    let rule = "=".repeat(72);
    let mut out = format!("{}\n{}\n{}\n", rule, console::style("TRANSCRIPT STATUS").bold(), rule);
    out.push_str(&format!("Total videos:       {}\n", report.total_videos));
    out.push_str(&format!(
        "With transcript:    {} ({:.1}%)\n",
        report.with_transcript,
        report.coverage()
    ));
    out.push_str(&format!("Without transcript: {}\n", report.without_transcript));

    if let Some(lengths) = &report.lengths {
        out.push_str(&format!(
            "Length:             avg {:.0}, min {}, max {} chars\n",
            lengths.average, lengths.min, lengths.max
        ));
    }

    if !report.by_tier.is_empty() {
        out.push_str("\nBy tier:\n");
        for (tier, count) in &report.by_tier {
            out.push_str(&format!("  {:<12} {:>8}\n", tier, count));
        }
    }

    if !report.by_channel.is_empty() {
        out.push_str(&format!("\n{:<30} {:>8} {:>12} {:>8}\n", "Channel", "Total", "Transcripts", "%"));
        out.push_str(&"-".repeat(72));
        out.push('\n');
        for channel in &report.by_channel {
            out.push_str(&format!(
                "{:<30} {:>8} {:>12} {:>7.1}%\n",
                truncate_title(&channel.channel_name, 30),
                channel.total,
                channel.with_transcript,
                channel.percentage()
            ));
        }
    }

    if !report.missing_sample.is_empty() {
        out.push_str("\nMost viewed without a transcript:\n");
        for (i, video) in report.missing_sample.iter().enumerate() {
            out.push_str(&format!(
                "{}. {} [{}] {} views\n",
                i + 1,
                truncate_title(&video.title, 60),
                video.video_id,
                video.view_count
            ));
        }
    }

    Ok(out.trim_end().to_string())
}

/// Save rendered output to file
pub fn save_to_file(content: &str, path: &Path) -> Result<()> {
    fs_err::write(path, content)?;
    Ok(())
}

/// Print rendered output to console
pub fn print_to_console(content: &str) {
    println!("{}", content);
}
