//! The external answer generation service.
//!
//! [`Generator`] is the seam between retrieval and generation: the
//! [composer](crate::composer) only needs "prompt in, text out". The
//! production implementation calls the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::GenerationConfig,
    error::{Error, Result},
    text_util::truncate_chars,
};

/// How much of a failed response body is kept in the error message.
const ERROR_BODY_MAX_CHARS: usize = 300;

/// Text produced by the generation service for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// Prompt plus output tokens, when the service reports them.
    pub tokens_used: Option<u32>,
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Send one prompt. No retries; failures are returned to the caller.
    async fn generate(&self, prompt: &str) -> Result<Generation>;
}

/// Gemini `generateContent` client.
pub struct GeminiGenerator {
    config: GenerationConfig,
    client: reqwest::Client,
}

impl GeminiGenerator {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.endpoint, self.config.model
        )
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, prompt: &str) -> Result<Generation> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: RequestGenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        debug!(
            model = %self.config.model,
            prompt_chars = prompt.chars().count(),
            "calling generation service"
        );

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(%status, "generation service returned an error");
            return Err(Error::Generation(format!(
                "{status}: {}",
                truncate_chars(text.trim(), ERROR_BODY_MAX_CHARS)
            )));
        }

        let parsed: GenerateContentResponse = response.json().await?;
        Ok(parsed.into_generation())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: RequestGenerationConfig,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
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
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

impl GenerateContentResponse {
    fn into_generation(self) -> Generation {
        let text = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();

        let tokens_used = self.usage_metadata.map(|u| {
            u.prompt_token_count.saturating_add(u.candidates_token_count)
        });

        Generation { text, tokens_used }
    }
}
