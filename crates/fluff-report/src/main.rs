//! Space Fluff vote report
//!
//! Runs the aggregation pipeline over classification records and prints a
//! markdown summary or the full JSON report.
//!
//! # Usage
//!
//! ```bash
//! # Records already parsed into JSON
//! fluff-report --input records.json
//!
//! # Decoded export rows (one JSON object per line), power users only
//! fluff-report --input classify.jsonl --export-rows --power-user-threshold 20
//!
//! # Custom configuration, JSON output
//! FLUFF_MIN_VOTES=5 fluff-report --input records.json --config fluff.toml --format json
//! ```

mod input;

use std::path::PathBuf;

use aggregation::{Pipeline, PipelineConfig};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, ValueEnum};
use tracing::info;

/// Output format for the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Markdown,
    Json,
}

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Records file: a JSON array of records, or JSON lines with --export-rows
    #[arg(long)]
    input: PathBuf,

    /// Treat the input as decoded export rows rather than parsed records
    #[arg(long, default_value_t = false)]
    export_rows: bool,

    /// Fail on the first export row that cannot be adapted
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// TOML pipeline configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Discard records submitted at or before this RFC 3339 instant
    /// (overrides FLUFF_EXCLUDED_BEFORE)
    #[arg(long)]
    excluded_before: Option<DateTime<Utc>>,

    /// Aggregate only users with at least this many valid records
    /// (overrides FLUFF_POWER_USER_THRESHOLD)
    #[arg(long)]
    power_user_threshold: Option<usize>,

    /// Report only objects with more than this many votes (overrides FLUFF_MIN_VOTES)
    #[arg(long)]
    min_votes: Option<usize>,

    #[arg(long, value_enum, default_value_t = Format::Markdown)]
    format: Format,

    /// Write the report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    config.apply_env()?;

    if let Some(cutoff) = args.excluded_before {
        config.excluded_before = cutoff;
    }
    if let Some(threshold) = args.power_user_threshold {
        config.power_user_threshold = Some(threshold);
    }
    if let Some(min) = args.min_votes {
        config.min_votes = Some(min);
    }
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&args)?;
    info!(
        excluded_before = %config.excluded_before,
        power_user_threshold = ?config.power_user_threshold,
        min_votes = ?config.min_votes,
        "Starting vote report"
    );

    let records = if args.export_rows {
        input::load_export_rows(
            &args.input,
            &[config.primary_task, config.secondary_task],
            args.strict,
        )?
    } else {
        input::load_records(&args.input)?
    };

    let report = Pipeline::new(config)
        .run(&records)
        .context("Aggregation pipeline failed")?;

    let rendered = match args.format {
        Format::Markdown => report.format_report(),
        Format::Json => serde_json::to_string_pretty(&report)?,
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Report written");
        }
        None => println!("{rendered}"),
    }

    Ok(())
}
