//! The `Translator` seam between the pipeline and the language service.
//!
//! `TranslationGateway` issues exactly one completion request per call. No
//! retries: the caller drops the batch on failure and moves on.

use async_trait::async_trait;
use tracing::debug;

use honyaku_core::config::OpenAiConfig;

use crate::prompt::TranslationPrompt;
use crate::provider::{ChatRequest, LlmProvider, Message, ProviderError};

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("translation backend failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("translation backend returned an empty response")]
    EmptyResponse,
}

/// Anything that can turn source text into target-language text.
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, TranslationError>;
}

pub struct TranslationGateway {
    provider: Box<dyn LlmProvider>,
    prompt: TranslationPrompt,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl TranslationGateway {
    pub fn new(provider: Box<dyn LlmProvider>, prompt: TranslationPrompt, model: String) -> Self {
        Self {
            provider,
            prompt,
            model,
            temperature: 0.2,
            max_tokens: 1024,
        }
    }

    /// Build a gateway with model and sampling settings from `[openai]`.
    pub fn from_config(
        provider: Box<dyn LlmProvider>,
        prompt: TranslationPrompt,
        config: &OpenAiConfig,
    ) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            ..Self::new(provider, prompt, config.model.clone())
        }
    }

    fn request_for(&self, text: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            system: String::new(),
            messages: vec![Message::user(self.prompt.render(text))],
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        }
    }
}

#[async_trait]
impl Translator for TranslationGateway {
    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        let req = self.request_for(text);
        let resp = self.provider.send(&req).await?;

        debug!(
            provider = self.provider.name(),
            model = %resp.model,
            tokens_in = resp.tokens_in,
            tokens_out = resp.tokens_out,
            "translation received"
        );

        let translated = resp.content.trim();
        if translated.is_empty() {
            return Err(TranslationError::EmptyResponse);
        }
        Ok(translated.to_string())
    }
}
