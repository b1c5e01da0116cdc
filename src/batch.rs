//! Batch driver: read, summarise and write reviews one row at a time.

use std::{panic::AssertUnwindSafe, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use futures::FutureExt;
use tracing::{error, info};

use crate::{
    records::{ReviewReader, ReviewRecord, ReviewWriter},
    summarize::{outcome_text, Summarizer, Summary, TextGenerator},
};

/// Rows per batch and the pause taken after each full batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub batch_size: usize,
    pub delay: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            delay: Duration::from_secs(2),
        }
    }
}

/// Counters describing a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub rows: u64,
    pub batches: u64,
    pub delays: u64,
    pub generated: u64,
    pub empty: u64,
    pub fallbacks: u64,
    pub passed_through: u64,
}

/// Summarise every review in `input` and write the result to `output`.
pub async fn process_reviews<G: TextGenerator>(
    input: &Path,
    output: &Path,
    text_column: &str,
    summarizer: &Summarizer<G>,
    options: BatchOptions,
) -> Result<BatchReport> {
    if options.batch_size == 0 {
        bail!("batch size must be at least 1");
    }

    let mut reader = ReviewReader::open(input, text_column)
        .with_context(|| format!("reading {}", input.display()))?;
    let headers = reader.raw_headers().to_vec();
    let mut writer = ReviewWriter::create(output, &headers)
        .with_context(|| format!("creating {}", output.display()))?;

    let mut report = BatchReport::default();
    let mut batch: Vec<ReviewRecord> = Vec::with_capacity(options.batch_size);

    let mut records = reader.records().peekable();
    while let Some(record) = records.next() {
        batch.push(record.with_context(|| format!("reading {}", input.display()))?);
        report.rows += 1;

        if batch.len() >= options.batch_size {
            process_batch(batch.drain(..), &mut writer, summarizer, &mut report).await?;
            if records.peek().is_none() {
                info!(processed = report.rows, "processed {} reviews total", report.rows);
                break;
            }
            info!(processed = report.rows, "processed {} reviews", report.rows);
            tokio::time::sleep(options.delay).await;
            report.delays += 1;
        }
    }

    if !batch.is_empty() {
        process_batch(batch.drain(..), &mut writer, summarizer, &mut report).await?;
        info!(processed = report.rows, "processed {} reviews total", report.rows);
    }

    writer.flush()?;
    info!(
        rows = report.rows,
        written = writer.rows_written(),
        batches = report.batches,
        fallbacks = report.fallbacks,
        output = %output.display(),
        "finished summarising reviews"
    );
    Ok(report)
}

async fn process_batch<G, I, W>(
    batch: I,
    writer: &mut ReviewWriter<W>,
    summarizer: &Summarizer<G>,
    report: &mut BatchReport,
) -> Result<()>
where
    G: TextGenerator,
    I: IntoIterator<Item = ReviewRecord>,
    W: std::io::Write,
{
    for mut record in batch {
        let outcome = AssertUnwindSafe(summarizer.summarize(record.text()))
            .catch_unwind()
            .await;
        match outcome {
            Ok(outcome) => {
                match &outcome {
                    Ok(Summary::Generated(_)) => report.generated += 1,
                    Ok(Summary::Empty) => report.empty += 1,
                    Err(_) => report.fallbacks += 1,
                }
                let text = outcome_text(&outcome).to_string();
                record.set_text(text);
            }
            Err(panic) => {
                error!(
                    error = %panic_message(&*panic),
                    "error processing review, keeping original text"
                );
                report.passed_through += 1;
            }
        }
        writer.write(&record)?;
    }
    writer.flush()?;
    report.batches += 1;
    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
