use std::{
    path::Path,
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use review_summarizer::{
    batch::{process_reviews, BatchOptions},
    summarize::{
        GenerateError, Generation, RetryPolicy, Summarizer, TextGenerator, EMPTY_TEXT,
        FALLBACK_TEXT,
    },
};
use tempfile::TempDir;

/// Answers every prompt the same way.
struct Fixed(Result<Option<&'static str>, ()>, AtomicU32);

impl Fixed {
    fn ok(text: &'static str) -> Self {
        Self(Ok(Some(text)), AtomicU32::new(0))
    }
    fn empty() -> Self {
        Self(Ok(None), AtomicU32::new(0))
    }
    fn failing() -> Self {
        Self(Err(()), AtomicU32::new(0))
    }
    fn calls(&self) -> u32 {
        self.1.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for Fixed {
    async fn generate(&self, _prompt: &str) -> Result<Generation, GenerateError> {
        self.1.fetch_add(1, Ordering::SeqCst);
        match self.0 {
            Ok(text) => Ok(Generation {
                text: text.map(str::to_string),
            }),
            Err(()) => Err(GenerateError::Other("service unavailable".into())),
        }
    }
}

/// Panics on reviews containing "boom", echoes the prompt tail otherwise.
struct Fragile {
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl TextGenerator for Fragile {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerateError> {
        self.seen.lock().unwrap().push(prompt.to_string());
        if prompt.contains("boom") {
            panic!("generator contract violated");
        }
        Ok(Generation::text("summary"))
    }
}

const HEADER: [&str; 4] = ["Text", "Stars", "Author", "Date"];

fn write_input(dir: &TempDir, rows: usize) -> std::path::PathBuf {
    let path = dir.path().join("in.csv");
    let mut writer = csv::Writer::from_path(&path).unwrap();
    writer.write_record(HEADER).unwrap();
    for i in 0..rows {
        writer
            .write_record([
                format!("Review number {i}, with a comma"),
                format!("{}", i % 5 + 1),
                format!("author-{i}"),
                format!("2024-01-{:02}", i + 1),
            ])
            .unwrap();
    }
    writer.flush().unwrap();
    path
}

fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let headers = reader.headers().unwrap().iter().map(String::from).collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(String::from).collect())
        .collect();
    (headers, rows)
}

fn no_delay(batch_size: usize) -> BatchOptions {
    BatchOptions {
        batch_size,
        delay: Duration::ZERO,
    }
}

#[tokio::test]
async fn successful_summaries_replace_only_text_column() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, 7);
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(Fixed::ok("X"), RetryPolicy::immediate(3));

    let report = process_reviews(&input, &output, "Text", &summarizer, no_delay(3))
        .await
        .unwrap();

    let (in_headers, in_rows) = read_csv(&input);
    let (out_headers, out_rows) = read_csv(&output);
    assert_eq!(out_headers, in_headers);
    assert_eq!(out_rows.len(), in_rows.len());
    for (before, after) in in_rows.iter().zip(&out_rows) {
        assert_eq!(after[0], "X");
        assert_eq!(after[1..], before[1..]);
    }
    assert_eq!(report.rows, 7);
    assert_eq!(report.generated, 7);
    assert_eq!(report.batches, 3);
}

#[tokio::test]
async fn exhausted_retries_write_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, 2);
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(Fixed::failing(), RetryPolicy::immediate(3));

    let report = process_reviews(&input, &output, "Text", &summarizer, no_delay(10))
        .await
        .unwrap();

    let (_, rows) = read_csv(&output);
    assert!(rows.iter().all(|row| row[0] == FALLBACK_TEXT));
    assert_eq!(report.fallbacks, 2);
    assert_eq!(summarizer.generator().calls(), 6);
}

#[tokio::test]
async fn empty_generations_write_apology() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, 3);
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(Fixed::empty(), RetryPolicy::immediate(3));

    let report = process_reviews(&input, &output, "Text", &summarizer, no_delay(2))
        .await
        .unwrap();

    let (_, rows) = read_csv(&output);
    assert!(rows.iter().all(|row| row[0] == EMPTY_TEXT));
    assert_eq!(report.empty, 3);
    assert_eq!(report.fallbacks, 0);
}

#[tokio::test]
async fn delays_follow_full_batches_only() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, 5);
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(Fixed::ok("X"), RetryPolicy::immediate(3));

    let report = process_reviews(&input, &output, "Text", &summarizer, no_delay(2))
        .await
        .unwrap();
    assert_eq!(report.batches, 3);
    assert_eq!(report.delays, 2);
    assert_eq!(read_csv(&output).1.len(), 5);
}

#[tokio::test]
async fn no_delay_after_batch_that_ends_input() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, 4);
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(Fixed::ok("X"), RetryPolicy::immediate(3));

    let report = process_reviews(&input, &output, "Text", &summarizer, no_delay(2))
        .await
        .unwrap();
    assert_eq!(report.batches, 2);
    assert_eq!(report.delays, 1);
}

#[tokio::test(start_paused = true)]
async fn inter_batch_delay_is_awaited() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, 5);
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(Fixed::ok("X"), RetryPolicy::immediate(3));
    let options = BatchOptions {
        batch_size: 2,
        delay: Duration::from_secs(2),
    };

    let start = tokio::time::Instant::now();
    process_reviews(&input, &output, "Text", &summarizer, options)
        .await
        .unwrap();
    assert_eq!(start.elapsed(), Duration::from_secs(4));
}

#[tokio::test]
async fn panicking_row_is_passed_through_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.csv");
    let body = "Text,Stars\nfine ring,5\nboom goes the clasp,1\ngood,4\n";
    std::fs::write(&input, body).unwrap();
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(
        Fragile {
            seen: Mutex::new(Vec::new()),
        },
        RetryPolicy::immediate(3),
    );

    let report = process_reviews(&input, &output, "Text", &summarizer, no_delay(10))
        .await
        .unwrap();

    let (_, rows) = read_csv(&output);
    assert_eq!(rows[0][0], "summary");
    assert_eq!(rows[1], vec!["boom goes the clasp", "1"]);
    assert_eq!(rows[2][0], "summary");
    assert_eq!(report.passed_through, 1);
    assert_eq!(report.generated, 2);
}

#[tokio::test]
async fn bom_prefixed_text_header_is_matched() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.csv");
    std::fs::write(&input, "\u{feff}Text,Stars\nlovely,5\n").unwrap();
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(Fixed::ok("short"), RetryPolicy::immediate(3));

    process_reviews(&input, &output, "Text", &summarizer, no_delay(10))
        .await
        .unwrap();

    let (headers, rows) = read_csv(&output);
    assert_eq!(headers, vec!["Text", "Stars"]);
    assert_eq!(rows, vec![vec!["short", "5"]]);
}

#[tokio::test]
async fn header_only_input_yields_header_only_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, 0);
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(Fixed::ok("X"), RetryPolicy::immediate(3));

    let report = process_reviews(&input, &output, "Text", &summarizer, no_delay(2))
        .await
        .unwrap();
    assert_eq!(report.rows, 0);
    assert_eq!(report.batches, 0);
    let (headers, rows) = read_csv(&output);
    assert_eq!(headers, HEADER);
    assert!(rows.is_empty());
}

#[tokio::test]
async fn missing_input_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let summarizer = Summarizer::new(Fixed::ok("X"), RetryPolicy::immediate(3));
    let err = process_reviews(
        &dir.path().join("absent.csv"),
        &dir.path().join("out.csv"),
        "Text",
        &summarizer,
        no_delay(2),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("absent.csv"));
}

#[tokio::test]
async fn zero_batch_size_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_input(&dir, 1);
    let summarizer = Summarizer::new(Fixed::ok("X"), RetryPolicy::immediate(3));
    let output = dir.path().join("out.csv");
    let result = process_reviews(&input, &output, "Text", &summarizer, no_delay(0)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn bom_is_written_back_byte_for_byte() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.csv");
    std::fs::write(&input, "\u{feff}Text,Stars\nlovely,5\n").unwrap();
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(Fixed::ok("short"), RetryPolicy::immediate(3));

    process_reviews(&input, &output, "Text", &summarizer, no_delay(10))
        .await
        .unwrap();

    let before = std::fs::read(&input).unwrap();
    let after = std::fs::read(&output).unwrap();
    assert_eq!(after[..3], before[..3]);
    assert_eq!(
        String::from_utf8(after).unwrap(),
        "\u{feff}Text,Stars\nshort,5\n"
    );
}

#[tokio::test]
async fn duplicate_columns_keep_their_own_values() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.csv");
    std::fs::write(&input, "Text,Note,Note\nlovely,a,b\n").unwrap();
    let output = dir.path().join("out.csv");
    let summarizer = Summarizer::new(Fixed::ok("X"), RetryPolicy::immediate(3));

    process_reviews(&input, &output, "Text", &summarizer, no_delay(10))
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "Text,Note,Note\nX,a,b\n"
    );
}
