//! honyaku-telegram — Telegram Bot API adapter.
//!
//! - [`adapter`]: long-polling dispatcher that feeds the pipeline
//! - [`handler`]: teloxide `Message` → [`honyaku_core::InboundEvent`]
//! - [`send`]: [`honyaku_pipeline::Platform`] over `sendMessage` / `editMessageText`

pub mod adapter;
pub mod error;
pub mod handler;
pub mod send;

pub use adapter::{bot_from_config, TelegramAdapter};
pub use error::TelegramError;
pub use send::TelegramPlatform;
