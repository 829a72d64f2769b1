//! honyaku-agent — the language-model side of the translator.
//!
//! - [`provider`]: provider-neutral request/response types and the `LlmProvider` trait
//! - [`openai`]: OpenAI-compatible chat-completions backend
//! - [`prompt`]: translation prompt rendering
//! - [`truncate`]: character budget enforcement before a request is sent
//! - [`gateway`]: the `Translator` seam the pipeline depends on

pub mod gateway;
pub mod openai;
pub mod prompt;
pub mod provider;
pub mod truncate;

pub use gateway::{TranslationError, TranslationGateway, Translator};
pub use openai::OpenAiProvider;
pub use prompt::TranslationPrompt;
pub use provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
