//! Review summarisation through a generative text model.

pub mod gemini;
pub mod prompt;
pub mod retry;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub use gemini::GeminiClient;
pub use retry::{Exhausted, RetryPolicy};

/// Written when every attempt failed.
pub const FALLBACK_TEXT: &str = "Error processing review. Skipping.";
/// Written when the model answered without any text.
pub const EMPTY_TEXT: &str = "I apologize, I couldn't generate a complete response.";

/// Raw model answer; `None` when the response carried no text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Generation {
    pub text: Option<String>,
}

impl Generation {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model reported error: {0}")]
    Api(String),
    #[error("{0}")]
    Other(String),
}

/// Anything that can turn a prompt into generated text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerateError>;
}

/// A model call that returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Summary {
    Generated(String),
    /// The call succeeded but produced no text.
    Empty,
}

impl Summary {
    pub fn text(&self) -> &str {
        match self {
            Summary::Generated(text) => text,
            Summary::Empty => EMPTY_TEXT,
        }
    }
}

/// The retry budget ran out.
#[derive(Debug)]
pub struct Fallback {
    pub attempts: u32,
    pub last_error: GenerateError,
}

impl Fallback {
    pub fn text(&self) -> &'static str {
        FALLBACK_TEXT
    }
}

impl From<Exhausted<GenerateError>> for Fallback {
    fn from(value: Exhausted<GenerateError>) -> Self {
        Self {
            attempts: value.attempts,
            last_error: value.last_error,
        }
    }
}

/// Text written to the output cell for a summarisation outcome.
pub fn outcome_text(outcome: &Result<Summary, Fallback>) -> &str {
    match outcome {
        Ok(summary) => summary.text(),
        Err(fallback) => fallback.text(),
    }
}

/// Prompt construction and retry policy wrapped around a [`TextGenerator`].
pub struct Summarizer<G> {
    generator: G,
    policy: RetryPolicy,
}

impl<G: TextGenerator> Summarizer<G> {
    pub fn new(generator: G, policy: RetryPolicy) -> Self {
        Self { generator, policy }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Summarise one review. Errors are absorbed into [`Fallback`].
    pub async fn summarize(&self, review: &str) -> Result<Summary, Fallback> {
        let prompt = prompt::build_prompt(review);
        let generation = self
            .policy
            .run(|attempt| {
                debug!(attempt, chars = prompt.len(), "requesting summary");
                self.generator.generate(&prompt)
            })
            .await
            .map_err(|exhausted| {
                warn!(
                    attempts = exhausted.attempts,
                    error = %exhausted.last_error,
                    "giving up on review"
                );
                Fallback::from(exhausted)
            })?;

        Ok(match generation.text {
            Some(text) if !text.is_empty() => Summary::Generated(text),
            _ => Summary::Empty,
        })
    }
}
