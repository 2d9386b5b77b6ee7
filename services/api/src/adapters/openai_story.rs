//! services/api/src/adapters/openai_story.rs
//!
//! This module contains the OpenAI chapter-writing backend.
//! It implements the `StoryBackend` port from the `core` crate, trying each
//! configured chat model in turn until one of them produces a chapter.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use crate::adapters::{max_output_tokens, option_timeout, parse_verdict, within};
use async_trait::async_trait;
use std::time::Duration;
use story_engine_core::{
    domain::GenerationRequest,
    ports::{PortError, PortResult, StoryBackend},
};
use tracing::{debug, warn};

const MODERATION_INSTRUCTIONS: &str = "You review stories written for young children. \
Reply with exactly one word: SAFE if the text is gentle and suitable for a child aged 3 to 12, \
or UNSAFE if it contains anything violent, frightening, dangerous or hostile.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `StoryBackend` using OpenAI chat completions.
#[derive(Clone)]
pub struct OpenAiStoryAdapter {
    client: Client<OpenAIConfig>,
    /// Tried in order; the first model that answers wins.
    models: Vec<String>,
    /// Upper bound for a single model's completion.
    option_timeout: Duration,
}

impl OpenAiStoryAdapter {
    /// Creates a new `OpenAiStoryAdapter`.
    ///
    /// `attempt_budget` is the time the whole model cascade may take; each
    /// model gets an equal share of it.
    pub fn new(
        client: Client<OpenAIConfig>,
        models: Vec<String>,
        attempt_budget: Duration,
    ) -> Self {
        let option_timeout = option_timeout(attempt_budget, models.len());
        Self {
            client,
            models,
            option_timeout,
        }
    }

    async fn complete(
        &self,
        model: &str,
        instructions: &str,
        input: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> PortResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(instructions)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(input)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .max_tokens(max_tokens)
            .temperature(temperature)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| {
                PortError::Unexpected(format!("{} returned no text content", model))
            })
    }
}

//=========================================================================================
// `StoryBackend` Trait Implementation
//=========================================================================================

#[async_trait]
impl StoryBackend for OpenAiStoryAdapter {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_chapter(&self, request: &GenerationRequest) -> PortResult<String> {
        let mut last_error = PortError::Unexpected("no OpenAI models configured".to_string());

        for model in &self.models {
            let call = self.complete(
                model,
                &request.system_prompt,
                &request.prompt,
                max_output_tokens(request.length),
                0.8,
            );
            match within(self.option_timeout, model, call).await {
                Ok(text) => {
                    debug!(model = %model, chars = text.len(), "OpenAI chapter received");
                    return Ok(text);
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "OpenAI model failed; trying the next one");
                    last_error = e;
                }
            }
        }

        Err(PortError::Unexpected(format!(
            "all OpenAI models failed, last error: {}",
            last_error
        )))
    }

    async fn moderate_content(&self, text: &str) -> PortResult<bool> {
        let model = self
            .models
            .first()
            .ok_or_else(|| PortError::Unexpected("no OpenAI models configured".to_string()))?;
        let call = self.complete(model, MODERATION_INSTRUCTIONS, text, 5, 0.0);
        let reply = within(self.option_timeout, model, call).await?;
        Ok(parse_verdict(&reply))
    }
}
