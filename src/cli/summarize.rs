//! CLI entry-point for summarising a reviews file.

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Args as ClapArgs;
use tracing::{info, instrument};

use crate::{
    batch::{self, BatchOptions},
    config::Settings,
    summarize::{GeminiClient, Summarizer},
};

/// Args for the `summarize` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Reviews CSV to read (defaults to REVIEWS_INPUT).
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Destination CSV, overwritten if present (defaults to REVIEWS_OUTPUT).
    #[arg(long)]
    pub output: Option<PathBuf>,
    /// Header of the review text column.
    #[arg(long)]
    pub text_column: Option<String>,
    /// Rows summarised between pauses.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub batch_size: Option<u64>,
    /// Seconds to pause after each full batch.
    #[arg(long)]
    pub delay_secs: Option<u64>,
}

impl Args {
    fn options(&self, settings: &Settings) -> BatchOptions {
        BatchOptions {
            batch_size: self
                .batch_size
                .map(|n| n as usize)
                .unwrap_or(settings.batch.batch_size),
            delay: self
                .delay_secs
                .map(Duration::from_secs)
                .unwrap_or(settings.batch.delay),
        }
    }
}

#[instrument(skip(settings))]
pub async fn run(args: Args, settings: Settings) -> Result<()> {
    let input = args.input.clone().unwrap_or_else(|| settings.input.clone());
    let output = args.output.clone().unwrap_or_else(|| settings.output.clone());
    let text_column = args
        .text_column
        .clone()
        .unwrap_or_else(|| settings.text_column.clone());
    let options = args.options(&settings);

    let client = GeminiClient::from_settings(&settings)?;
    let summarizer = Summarizer::new(client, settings.retry);

    info!(
        input = %input.display(),
        output = %output.display(),
        model = %settings.model,
        ?options,
        "summarising reviews"
    );
    let report =
        batch::process_reviews(&input, &output, &text_column, &summarizer, options).await?;

    println!(
        "{} reviews written to {} ({} summarised, {} empty, {} failed, {} unchanged)",
        report.rows,
        output.display(),
        report.generated,
        report.empty,
        report.fallbacks,
        report.passed_through
    );
    Ok(())
}
