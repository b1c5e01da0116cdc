//! Runtime configuration utilities for review-summarizer.

use std::{env, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};

use crate::{
    batch::BatchOptions,
    summarize::{gemini::GenerationConfig, RetryPolicy},
};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-exp";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_INPUT: &str = "Jewelry Store Google Map Reviews.csv";
pub const DEFAULT_OUTPUT: &str = "Improved Jewelry Store Google Map Reviews.csv";
pub const DEFAULT_TEXT_COLUMN: &str = "Text";

/// Application configuration resolved from `.env` and defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Gemini API key. Only required by commands that call the model.
    pub api_key: Option<String>,
    /// Model name appended to the `generateContent` route.
    pub model: String,
    /// Root of the generative language REST API.
    pub api_base: String,
    /// Reviews CSV read by `summarize`.
    pub input: PathBuf,
    /// Destination CSV, overwritten on every run.
    pub output: PathBuf,
    /// Header of the column holding the review body.
    pub text_column: String,
    /// Rows per batch and pause after each full batch.
    pub batch: BatchOptions,
    /// Attempt budget and backoff bounds around each model call.
    pub retry: RetryPolicy,
    /// Sampling parameters forwarded to the model; unset fields use the model default.
    pub generation: GenerationConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            text_column: DEFAULT_TEXT_COLUMN.to_string(),
            batch: BatchOptions::default(),
            retry: RetryPolicy::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl Settings {
    /// Load configuration from environment with reasonable defaults.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Ok(Self::from_lookup(|key| env::var(key).ok()))
    }

    /// Resolve settings from an arbitrary key lookup; `load` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let api_key = lookup("GOOGLE_API_KEY").filter(|k| !k.trim().is_empty());
        let model = lookup("GEMINI_MODEL").unwrap_or(defaults.model);
        let api_base = lookup("GEMINI_API_BASE").unwrap_or(defaults.api_base);
        let input = lookup("REVIEWS_INPUT")
            .map(PathBuf::from)
            .unwrap_or(defaults.input);
        let output = lookup("REVIEWS_OUTPUT")
            .map(PathBuf::from)
            .unwrap_or(defaults.output);
        let text_column = lookup("REVIEW_TEXT_COLUMN").unwrap_or(defaults.text_column);

        let batch = BatchOptions {
            batch_size: parsed("BATCH_SIZE")
                .map(|v| v as usize)
                .unwrap_or(defaults.batch.batch_size),
            delay: parsed("BATCH_DELAY_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.batch.delay),
        };

        let retry = RetryPolicy {
            max_attempts: parsed("RETRY_MAX_ATTEMPTS")
                .map(|v| v as u32)
                .unwrap_or(defaults.retry.max_attempts),
            floor: parsed("RETRY_MIN_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry.floor),
            ceiling: parsed("RETRY_MAX_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.retry.ceiling),
            jitter: lookup("RETRY_JITTER")
                .and_then(|v| v.trim().parse::<bool>().ok())
                .unwrap_or(defaults.retry.jitter),
            ..defaults.retry
        };

        let generation = GenerationConfig {
            temperature: lookup("GEMINI_TEMPERATURE").and_then(|v| v.trim().parse::<f32>().ok()),
            max_output_tokens: lookup("GEMINI_MAX_OUTPUT_TOKENS")
                .and_then(|v| v.trim().parse::<u32>().ok()),
        };

        Self {
            api_key,
            model,
            api_base,
            input,
            output,
            text_column,
            batch,
            retry,
            generation,
        }
    }

    /// API key or a descriptive error for commands that need one.
    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("GOOGLE_API_KEY is not set (environment or .env)"))
    }
}
