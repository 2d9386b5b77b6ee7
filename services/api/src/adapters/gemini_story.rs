//! services/api/src/adapters/gemini_story.rs
//!
//! This module contains the Gemini chapter-writing backend, spoken to over the
//! `generateContent` REST endpoint with `reqwest`. It implements the
//! `StoryBackend` port, trying every configured model against every API
//! version until one of them produces a chapter.

use crate::adapters::{max_output_tokens, option_timeout, parse_verdict, within};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use story_engine_core::{
    domain::GenerationRequest,
    ports::{PortError, PortResult, StoryBackend},
};
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const MODERATION_PROMPT: &str = "You review stories written for young children. \
Reply with exactly one word: SAFE if the following text is gentle and suitable for a child aged 3 to 12, \
or UNSAFE if it contains anything violent, frightening, dangerous or hostile.\n\nTEXT:\n";

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Joins the text parts of the first candidate, rejecting blocked output.
    fn into_text(self) -> PortResult<String> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(PortError::Unexpected(format!("prompt blocked: {}", reason)));
        }
        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| PortError::Unexpected("no candidates in response".to_string()))?;
        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(PortError::Unexpected("response blocked for safety".to_string()));
        }
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();
        if text.trim().is_empty() {
            return Err(PortError::Unexpected("response contained no text".to_string()));
        }
        Ok(text)
    }
}

fn map_http_error(error: reqwest::Error) -> PortError {
    if error.is_timeout() {
        PortError::Unexpected(format!("Request timeout: {}", error))
    } else if error.is_connect() {
        PortError::Unexpected(format!("Connection error: {}", error))
    } else {
        PortError::Unexpected(format!("HTTP error: {}", error))
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `StoryBackend` using the Gemini REST API.
#[derive(Clone)]
pub struct GeminiStoryAdapter {
    client: Client,
    base_url: String,
    api_key: String,
    models: Vec<String>,
    api_versions: Vec<String>,
    /// Upper bound for a single (version, model) request.
    option_timeout: Duration,
}

impl GeminiStoryAdapter {
    /// Creates a new `GeminiStoryAdapter`.
    ///
    /// `attempt_budget` is the time the whole cascade may take; it is shared
    /// evenly between every (version, model) option.
    pub fn new(
        base_url: String,
        api_key: String,
        models: Vec<String>,
        api_versions: Vec<String>,
        attempt_budget: Duration,
    ) -> PortResult<Self> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;
        let option_timeout = option_timeout(attempt_budget, models.len() * api_versions.len());
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            models,
            api_versions,
            option_timeout,
        })
    }

    /// Every (api version, model) pair, model-major, in configured order.
    fn options(&self) -> impl Iterator<Item = (&str, &str)> {
        self.models.iter().flat_map(move |model| {
            self.api_versions
                .iter()
                .map(move |version| (version.as_str(), model.as_str()))
        })
    }

    async fn generate_content(
        &self,
        version: &str,
        model: &str,
        text: String,
        temperature: f32,
        max_tokens: u32,
    ) -> PortResult<String> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text }],
            }],
            generation_config: GenerationConfig {
                temperature,
                max_output_tokens: max_tokens,
            },
        };

        let url = format!("{}/{}/models/{}:generateContent", self.base_url, version, model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(map_http_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(match status.as_u16() {
                404 => PortError::NotFound(format!(
                    "{} not available on {}: {}",
                    model, version, error_text
                )),
                _ => PortError::Unexpected(format!(
                    "Request failed with status {}: {}",
                    status, error_text
                )),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to parse response: {}", e)))?;
        parsed.into_text()
    }

    /// Runs one prompt through the cascade, returning the first success.
    async fn cascade(&self, text: &str, temperature: f32, max_tokens: u32) -> PortResult<String> {
        let mut last_error = PortError::Unexpected("no Gemini models configured".to_string());

        for (version, model) in self.options() {
            let call =
                self.generate_content(version, model, text.to_string(), temperature, max_tokens);
            match within(self.option_timeout, &format!("{model} on {version}"), call).await {
                Ok(text) => {
                    debug!(model, version, chars = text.len(), "Gemini response received");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(model, version, error = %e, "Gemini option failed; trying the next one");
                    last_error = e;
                }
            }
        }

        Err(PortError::Unexpected(format!(
            "all Gemini models failed, last error: {}",
            last_error
        )))
    }
}

//=========================================================================================
// `StoryBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl StoryBackend for GeminiStoryAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate_chapter(&self, request: &GenerationRequest) -> PortResult<String> {
        // System instructions are inlined so the same body works on every API version.
        let text = format!("{}\n\n{}", request.system_prompt, request.prompt);
        self.cascade(&text, 0.8, max_output_tokens(request.length))
            .await
    }

    async fn moderate_content(&self, text: &str) -> PortResult<bool> {
        let prompt = format!("{}{}", MODERATION_PROMPT, text);
        let reply = self.cascade(&prompt, 0.0, 5).await?;
        Ok(parse_verdict(&reply))
    }
}
