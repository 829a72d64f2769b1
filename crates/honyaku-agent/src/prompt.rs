//! Translation prompt rendering.
//!
//! The template is plain text with two placeholders: `{language}` for the
//! target language name and `{text}` for the (already capped) source text.

use honyaku_core::config::{TranslatorConfig, DEFAULT_PROMPT_TEMPLATE};

#[derive(Debug, Clone)]
pub struct TranslationPrompt {
    template: String,
    language: String,
}

impl TranslationPrompt {
    pub fn new(template: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            language: language.into(),
        }
    }

    pub fn from_config(config: &TranslatorConfig) -> Self {
        Self::new(&config.prompt_template, &config.target_language)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Render the prompt for `text`.
    ///
    /// `{language}` is substituted first so a source text that happens to
    /// contain the literal `{language}` is passed through untouched.
    pub fn render(&self, text: &str) -> String {
        self.template
            .replace("{language}", &self.language)
            .replace("{text}", text)
    }
}

impl Default for TranslationPrompt {
    fn default() -> Self {
        Self::new(DEFAULT_PROMPT_TEMPLATE, "Japanese")
    }
}
