//! CLI entry-point for inspecting a reviews file's header.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args as ClapArgs;

use crate::{config::Settings, records::ReviewReader};

/// Args for the `headers` command.
#[derive(Debug, Clone, ClapArgs)]
pub struct Args {
    /// Reviews CSV to inspect (defaults to REVIEWS_INPUT).
    #[arg(long)]
    pub input: Option<PathBuf>,
    /// Header of the review text column.
    #[arg(long)]
    pub text_column: Option<String>,
}

pub fn run(args: Args, settings: Settings) -> Result<()> {
    let input = args.input.unwrap_or(settings.input);
    let text_column = args.text_column.unwrap_or(settings.text_column);
    let reader = ReviewReader::open(&input, &text_column)
        .with_context(|| format!("reading {}", input.display()))?;
    for (idx, name) in reader.headers().iter().enumerate() {
        let marker = if idx == reader.text_index() { "  (review text)" } else { "" };
        println!("{name}{marker}");
    }
    Ok(())
}
