use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    value::{Uncased, UncasedStr},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{HonyakuError, Result};

/// Appended to amended messages. Zero-width, so readers never see it, and it
/// survives Telegram's HTML parse mode untouched.
pub const DEFAULT_TRANSLATION_TAG: &str = "\u{200B}\u{2063}\u{200B}";
pub const DEFAULT_TRUNCATION_MARKER: &str = "…";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MAX_CHARS: usize = 1500;
pub const DEFAULT_MIN_TEXT_CHARS: usize = 2;
pub const DEFAULT_KANA_THRESHOLD: usize = 6;
pub const DEFAULT_MERGE_WINDOW_SECS: f64 = 1.2;
/// Minimum spacing between actions in one chat when every message is its own batch.
pub const SINGLE_MIN_INTERVAL_SECS: f64 = 1.5;
/// Minimum spacing between actions in one chat when coalescing is on.
pub const MERGED_MIN_INTERVAL_SECS: f64 = 2.5;
pub const DEFAULT_PROCESSED_CAPACITY: usize = 10_000;
pub const DEFAULT_CHAT_IDLE_SECS: u64 = 600;

pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
You are a native {language} speaker chatting with friends on Telegram.
Translate the text below into natural, everyday, conversational {language}, \
the way people actually write in chat.

Rules:
1) Keep the tone and the distance of the original: casual, polite, playful, \
sarcastic or serious must stay that way.
2) Common colloquialisms and contractions are fine; do not overdo cuteness.
3) Keep proper nouns, numbers, URLs and emoji as they are; never change facts.
4) If the original is very short (\"ok\", \"lol\"), use an equally short, natural {language} expression.
5) No explanations, notes or romanization. Output only the translation, one or two lines.

Text:
{text}";

/// Top-level config (honyaku.toml + HONYAKU_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HonyakuConfig {
    pub telegram: TelegramConfig,
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub translator: TranslatorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
}

/// OpenAI-compatible completion endpoint used for translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// How a finished translation is delivered back to the chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Send a new message replying to the last message of the batch.
    #[default]
    Reply,
    /// Edit the original (self-authored) message in place.
    Amend,
}

/// Behaviour of the classify → coalesce → throttle → translate → dispatch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default)]
    pub mode: DispatchMode,

    /// Chats the translator is active in. Empty means every chat.
    /// Accepts a list or a comma-separated string (`"-100123, 42"`).
    #[serde(default, deserialize_with = "deserialize_chat_list")]
    pub allow_chats: Vec<i64>,

    /// Ignore messages authored by the bot itself.
    #[serde(default = "bool_true")]
    pub filter_self: bool,

    /// Coalescing window in seconds. 0 disables coalescing.
    /// Always treated as 0 in amend mode.
    #[serde(default = "default_merge_window_secs")]
    pub merge_window_secs: f64,

    /// Minimum seconds between two actions in the same chat.
    /// Defaults to 1.5 without coalescing and 2.5 with it.
    #[serde(default)]
    pub min_interval_secs: Option<f64>,

    /// Character budget for text sent to the translation backend.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default = "default_min_text_chars")]
    pub min_text_chars: usize,

    /// Kana count at which a message is considered already Japanese.
    #[serde(default = "default_kana_threshold")]
    pub kana_threshold: usize,

    #[serde(default = "default_translation_tag")]
    pub translation_tag: String,

    #[serde(default = "default_truncation_marker")]
    pub truncation_marker: String,

    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Prompt sent to the model. `{text}` and `{language}` are substituted.
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,

    /// Number of message IDs remembered for de-duplication.
    #[serde(default = "default_processed_capacity")]
    pub processed_capacity: usize,

    /// Seconds of inactivity after which a chat's coalescer task exits.
    #[serde(default = "default_chat_idle_secs")]
    pub chat_idle_secs: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            mode: DispatchMode::default(),
            allow_chats: Vec::new(),
            filter_self: true,
            merge_window_secs: DEFAULT_MERGE_WINDOW_SECS,
            min_interval_secs: None,
            max_chars: DEFAULT_MAX_CHARS,
            min_text_chars: DEFAULT_MIN_TEXT_CHARS,
            kana_threshold: DEFAULT_KANA_THRESHOLD,
            translation_tag: default_translation_tag(),
            truncation_marker: default_truncation_marker(),
            target_language: default_target_language(),
            prompt_template: default_prompt_template(),
            processed_capacity: DEFAULT_PROCESSED_CAPACITY,
            chat_idle_secs: DEFAULT_CHAT_IDLE_SECS,
        }
    }
}

impl TranslatorConfig {
    /// Effective coalescing window. Amend mode never merges: one edit per message.
    pub fn merge_window(&self) -> Duration {
        if self.mode == DispatchMode::Amend {
            return Duration::ZERO;
        }
        secs(self.merge_window_secs)
    }

    /// Effective per-chat minimum spacing between actions.
    pub fn min_interval(&self) -> Duration {
        match self.min_interval_secs {
            Some(s) => secs(s),
            None if self.merge_window().is_zero() => secs(SINGLE_MIN_INTERVAL_SECS),
            None => secs(MERGED_MIN_INTERVAL_SECS),
        }
    }

    pub fn chat_idle(&self) -> Duration {
        Duration::from_secs(self.chat_idle_secs)
    }

    fn validate(&self) -> Result<()> {
        check_secs("translator.merge_window_secs", self.merge_window_secs)?;
        if let Some(s) = self.min_interval_secs {
            check_secs("translator.min_interval_secs", s)?;
        }
        if self.max_chars == 0 {
            return Err(invalid("translator.max_chars", "must be greater than 0"));
        }
        if self.kana_threshold == 0 {
            return Err(invalid("translator.kana_threshold", "must be greater than 0"));
        }
        if self.translation_tag.trim().is_empty() {
            return Err(invalid("translator.translation_tag", "must contain non-whitespace characters"));
        }
        if self.processed_capacity == 0 {
            return Err(invalid("translator.processed_capacity", "must be greater than 0"));
        }
        if !self.prompt_template.contains("{text}") {
            return Err(invalid(
                "translator.prompt_template",
                "must contain the {text} placeholder",
            ));
        }
        if self.mode == DispatchMode::Amend && self.filter_self {
            return Err(invalid(
                "translator.filter_self",
                "amend mode only edits the bot's own messages; set filter_self = false",
            ));
        }
        Ok(())
    }
}

fn bool_true() -> bool {
    true
}
fn default_openai_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_merge_window_secs() -> f64 {
    DEFAULT_MERGE_WINDOW_SECS
}
fn default_max_chars() -> usize {
    DEFAULT_MAX_CHARS
}
fn default_min_text_chars() -> usize {
    DEFAULT_MIN_TEXT_CHARS
}
fn default_kana_threshold() -> usize {
    DEFAULT_KANA_THRESHOLD
}
fn default_translation_tag() -> String {
    DEFAULT_TRANSLATION_TAG.to_string()
}
fn default_truncation_marker() -> String {
    DEFAULT_TRUNCATION_MARKER.to_string()
}
fn default_target_language() -> String {
    "Japanese".to_string()
}
fn default_prompt_template() -> String {
    DEFAULT_PROMPT_TEMPLATE.to_string()
}
fn default_processed_capacity() -> usize {
    DEFAULT_PROCESSED_CAPACITY
}
fn default_chat_idle_secs() -> u64 {
    DEFAULT_CHAT_IDLE_SECS
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

/// Upper bound for every `*_secs` setting. Keeps `Instant + window` from
/// overflowing and catches unit mistakes (milliseconds written as seconds).
const MAX_SECS: f64 = 86_400.0;

fn check_secs(field: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && (0.0..=MAX_SECS).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, "must be between 0 and 86400 seconds"))
    }
}

fn invalid(field: &'static str, reason: &str) -> HonyakuError {
    HonyakuError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

/// Accept `[1, 2]`, `1` or `"1, 2"` for chat allow-lists.
fn deserialize_chat_list<'de, D>(deserializer: D) -> std::result::Result<Vec<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<i64>),
        One(i64),
        Csv(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::List(ids) => Ok(ids),
        Raw::One(id) => Ok(vec![id]),
        Raw::Csv(raw) => parse_chat_list(&raw).map_err(serde::de::Error::custom),
    }
}

/// Parse a comma-separated list of chat IDs. Blank entries are skipped.
pub fn parse_chat_list(raw: &str) -> std::result::Result<Vec<i64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i64>()
                .map_err(|e| format!("invalid chat id `{part}`: {e}"))
        })
        .collect()
}

/// Unprefixed variable names honoured for existing deployments.
const LEGACY_ENV: [&str; 6] = [
    "TELEGRAM_BOT_TOKEN",
    "OPENAI_API_KEY",
    "OPENAI_MODEL",
    "ALLOW_CHAT_IDS",
    "MIN_EDIT_INTERVAL_PER_CHAT",
    "MAX_CHARS",
];

/// Map the conventional unprefixed variables onto config keys.
fn legacy_key(key: &UncasedStr) -> Uncased<'_> {
    if key.as_str().eq_ignore_ascii_case("TELEGRAM_BOT_TOKEN") {
        "telegram.bot_token".into()
    } else if key.as_str().eq_ignore_ascii_case("OPENAI_API_KEY") {
        "openai.api_key".into()
    } else if key.as_str().eq_ignore_ascii_case("OPENAI_MODEL") {
        "openai.model".into()
    } else if key.as_str().eq_ignore_ascii_case("ALLOW_CHAT_IDS") {
        "translator.allow_chats".into()
    } else if key.as_str().eq_ignore_ascii_case("MIN_EDIT_INTERVAL_PER_CHAT") {
        "translator.min_interval_secs".into()
    } else if key.as_str().eq_ignore_ascii_case("MAX_CHARS") {
        "translator.max_chars".into()
    } else {
        key.as_str().into()
    }
}

impl HonyakuConfig {
    /// Load config from a TOML file with env var overrides, then validate.
    ///
    /// Sources, later ones winning:
    ///   1. TOML file (explicit path, else ~/.honyaku/honyaku.toml; missing is fine)
    ///   2. the unprefixed names in LEGACY_ENV (TELEGRAM_BOT_TOKEN, MAX_CHARS, ...)
    ///   3. HONYAKU_* with `__` as the nesting separator
    ///      (e.g. HONYAKU_TRANSLATOR__MERGE_WINDOW_SECS=0)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let figment = Figment::new()
            .merge(Toml::file(&path))
            .merge(
                Env::raw()
                    .only(&LEGACY_ENV)
                    .map(legacy_key),
            )
            .merge(Env::prefixed("HONYAKU_").split("__"));

        Self::from_figment(figment)
    }

    /// Extract and validate from an already-assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: HonyakuConfig = figment
            .extract()
            .map_err(|e| HonyakuError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(invalid("telegram.bot_token", "must not be empty"));
        }
        if self.openai.api_key.trim().is_empty() {
            return Err(invalid("openai.api_key", "must not be empty"));
        }
        if self.openai.model.trim().is_empty() {
            return Err(invalid("openai.model", "must not be empty"));
        }
        self.translator.validate()?;
        // The Bot API never delivers the bot's own messages, and bots cannot
        // edit anyone else's, so amend mode has nothing to act on.
        if self.translator.mode == DispatchMode::Amend {
            return Err(invalid(
                "translator.mode",
                "amend mode is not supported by the Telegram bot adapter; use \"reply\"",
            ));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.honyaku/honyaku.toml", home)
}
