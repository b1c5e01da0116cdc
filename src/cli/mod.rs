//! Command-line interface wiring for review-summarizer.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::Settings;

pub mod headers;
pub mod summarize;

/// Top-level CLI definition.
#[derive(Debug, Parser)]
#[command(author, version, about = "Summarise customer review CSVs with Gemini", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parse CLI arguments from the environment.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Dispatch the selected sub-command.
    pub async fn dispatch(self, settings: Settings) -> Result<()> {
        match self.command {
            Commands::Summarize(args) => summarize::run(args, settings).await,
            Commands::Headers(args) => headers::run(args, settings),
        }
    }
}

/// Supported sub-commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replace each review's text with a model-generated summary.
    Summarize(summarize::Args),
    /// Print the detected field names of a reviews file.
    Headers(headers::Args),
}
