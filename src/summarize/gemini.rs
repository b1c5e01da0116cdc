//! Gemini `generateContent` client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{GenerateError, Generation, TextGenerator};
use crate::config::Settings;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Generation parameters sent with each request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.max_output_tokens.is_none()
    }
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    pub fn new(
        api_base: &str,
        model: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, GenerateError> {
        let client = Client::builder()
            .user_agent("review-summarizer/0.1")
            .gzip(true)
            .brotli(true)
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            endpoint: format!(
                "{}/models/{}:generateContent",
                api_base.trim_end_matches('/'),
                model
            ),
            generation: GenerationConfig::default(),
        })
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let key = settings.require_api_key()?;
        let client = Self::new(&settings.api_base, &settings.model, key)?;
        Ok(client.with_generation_config(settings.generation.clone()))
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request_body<'a>(&'a self, prompt: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text: prompt }],
            }],
            generation_config: (!self.generation.is_empty()).then_some(&self.generation),
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<Generation, GenerateError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerateError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: GenerateResponse = response.json().await?;
        payload.into_generation()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<&'a GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

impl GenerateResponse {
    fn into_generation(self) -> Result<Generation, GenerateError> {
        if let Some(error) = self.error {
            return Err(GenerateError::Api(error.message));
        }
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Ok(Generation::default());
        };
        debug!(finish_reason = ?candidate.finish_reason, "received candidate");
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        Ok(Generation {
            text: (!text.is_empty()).then_some(text),
        })
    }
}
