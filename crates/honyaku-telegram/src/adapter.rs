//! Telegram channel adapter.
//!
//! Long polling: no public URL required. teloxide retries transport errors
//! on its own, so `run` only returns on shutdown (Ctrl-C).

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::info;

use honyaku_core::config::TelegramConfig;
use honyaku_pipeline::Pipeline;

use crate::error::TelegramError;
use crate::handler::{handle_message, BotIdentity};

pub struct TelegramAdapter {
    bot: Bot,
    pipeline: Arc<Pipeline>,
}

/// Build the `Bot` shared by the adapter and [`crate::TelegramPlatform`].
pub fn bot_from_config(config: &TelegramConfig) -> Result<Bot, TelegramError> {
    let token = config.bot_token.trim();
    if token.is_empty() {
        return Err(TelegramError::NoToken);
    }
    Ok(Bot::new(token))
}

impl TelegramAdapter {
    pub fn new(bot: Bot, pipeline: Arc<Pipeline>) -> Self {
        Self { bot, pipeline }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Resolve the bot's own identity, then drive the dispatcher until shutdown.
    pub async fn run(self) -> Result<(), TelegramError> {
        let me = self.bot.get_me().await?;
        let identity = BotIdentity::new(me.user.id.0);
        info!(
            bot_id = identity.user_id,
            username = me.user.username.as_deref().unwrap_or(""),
            "Telegram: starting long-polling dispatcher"
        );

        let handler = Update::filter_message().endpoint(handle_message);

        Dispatcher::builder(self.bot, handler)
            .dependencies(dptree::deps![self.pipeline, identity])
            .default_handler(|_upd| async {})
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        info!("Telegram: dispatcher stopped");
        Ok(())
    }
}
