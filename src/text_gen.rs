//! Flavor text for the adversary.
//!
//! Callers never see a failure: every generator resolves to a line, falling
//! back to fixed strings when the remote model is unavailable.

use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::{FALLBACK_GAME_OVER_LINE, FALLBACK_TAUNT, FALLBACK_TAUNT_ON_ERROR};
use crate::error::{PursuitError, Result};
use crate::types::TextRequestKind;

const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";

const TAUNT_PROMPT: &str = "You are a monster stalking someone through a dark maze. \
Whisper a very short, unsettling sentence of three to five words. No quotes.";
const GAME_OVER_PROMPT: &str = "The monster in the maze has just caught its prey. \
Write a single chilling sentence to close the game. No quotes.";

pub trait TextGenerator: Send + Sync {
    fn generate_taunt(&self) -> BoxFuture<'static, String>;

    fn generate_game_over_line(&self) -> BoxFuture<'static, String>;

    fn generate(&self, kind: TextRequestKind) -> BoxFuture<'static, String> {
        match kind {
            TextRequestKind::Taunt => self.generate_taunt(),
            TextRequestKind::GameOverLine => self.generate_game_over_line(),
        }
    }
}

/// Offline lines, used when no API key is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct FallbackTextGenerator;

impl TextGenerator for FallbackTextGenerator {
    fn generate_taunt(&self) -> BoxFuture<'static, String> {
        future::ready(FALLBACK_TAUNT.to_string()).boxed()
    }

    fn generate_game_over_line(&self) -> BoxFuture<'static, String> {
        future::ready(FALLBACK_GAME_OVER_LINE.to_string()).boxed()
    }
}

/// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiTextGenerator {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
}

impl GeminiTextGenerator {
    pub fn new(api_key: String, api_url: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_url,
            model,
        }
    }

    /// Required: API_KEY
    /// Optional: GEMINI_API_URL, GEMINI_MODEL
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("API_KEY")
            .map_err(|_| PursuitError::TextGeneration("API_KEY not set".into()))?;
        let api_url = std::env::var("GEMINI_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
        Ok(Self::new(api_key, api_url, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Returns the trimmed candidate text, which may be empty when the model
    /// declined to answer.
    pub async fn complete(&self, prompt: &str, max_tokens: u32, temperature: Option<f32>) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.into()),
                }],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: max_tokens,
                temperature,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PursuitError::TextGeneration(format!(
                "API error {status}: {error_text}"
            )));
        }

        let completion: GenerateResponse = response.json().await?;
        Ok(completion.text())
    }
}

impl TextGenerator for GeminiTextGenerator {
    fn generate_taunt(&self) -> BoxFuture<'static, String> {
        let generator = self.clone();
        async move {
            match generator.complete(TAUNT_PROMPT, 20, Some(1.2)).await {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => FALLBACK_TAUNT.to_string(),
                Err(err) => {
                    warn!(error = %err, "taunt generation failed");
                    FALLBACK_TAUNT_ON_ERROR.to_string()
                }
            }
        }
        .boxed()
    }

    fn generate_game_over_line(&self) -> BoxFuture<'static, String> {
        let generator = self.clone();
        async move {
            match generator.complete(GAME_OVER_PROMPT, 50, None).await {
                Ok(text) if !text.is_empty() => text,
                Ok(_) => FALLBACK_GAME_OVER_LINE.to_string(),
                Err(err) => {
                    warn!(error = %err, "game over line generation failed");
                    FALLBACK_GAME_OVER_LINE.to_string()
                }
            }
        }
        .boxed()
    }
}

/// Gemini when `API_KEY` is set, offline lines otherwise.
pub fn text_generator_from_env() -> Arc<dyn TextGenerator> {
    match GeminiTextGenerator::from_env() {
        Ok(generator) => {
            info!(model = generator.model(), "remote text generation enabled");
            Arc::new(generator)
        }
        Err(err) => {
            warn!(error = %err, "remote text generation disabled, using fallback lines");
            Arc::new(FallbackTextGenerator)
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

impl GenerateResponse {
    fn text(&self) -> String {
        let Some(content) = self.candidates.first().and_then(|c| c.content.as_ref()) else {
            return String::new();
        };
        content
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<String>()
            .trim()
            .to_string()
    }
}
