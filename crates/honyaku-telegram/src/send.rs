//! Outbound side of the adapter: the pipeline's `Platform` over the Bot API.
//!
//! Payloads arrive already escaped for Telegram's HTML parse mode.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode, ReplyParameters};
use tracing::debug;

use honyaku_core::{ChatId as CoreChatId, MessageId as CoreMessageId};
use honyaku_pipeline::{Platform, PlatformError};

/// Telegram's per-message text limit, in UTF-16 code units.
const MESSAGE_MAX: usize = 4096;

#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
}

impl TelegramPlatform {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Platform for TelegramPlatform {
    async fn emit(
        &self,
        chat: CoreChatId,
        html: &str,
        reply_to: Option<CoreMessageId>,
    ) -> Result<CoreMessageId, PlatformError> {
        check_length(html)?;

        let mut req = self
            .bot
            .send_message(ChatId(chat.0), html)
            .parse_mode(ParseMode::Html);
        if let Some(id) = reply_to {
            req = req.reply_parameters(ReplyParameters::new(MessageId(id.0)));
        }

        let sent = req
            .await
            .map_err(|e| PlatformError::SendFailed(e.to_string()))?;
        debug!(%chat, message = sent.id.0, "Telegram: message sent");
        Ok(CoreMessageId(sent.id.0))
    }

    async fn amend(
        &self,
        chat: CoreChatId,
        message: CoreMessageId,
        html: &str,
    ) -> Result<(), PlatformError> {
        check_length(html)?;

        self.bot
            .edit_message_text(ChatId(chat.0), MessageId(message.0), html)
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| PlatformError::EditFailed(e.to_string()))?;
        debug!(%chat, %message, "Telegram: message edited");
        Ok(())
    }
}

/// Reject payloads Telegram would refuse before spending a request on them.
/// The limit applies to the text left after entity parsing, not the markup.
fn check_length(html: &str) -> Result<(), PlatformError> {
    let units = visible_utf16_len(html);
    if units > MESSAGE_MAX {
        return Err(PlatformError::InvalidTarget(format!(
            "message text is {units} UTF-16 units, limit is {MESSAGE_MAX}"
        )));
    }
    Ok(())
}

/// UTF-16 length of `html` as Telegram renders it: tags removed, each
/// character reference counted as the one character it stands for.
fn visible_utf16_len(html: &str) -> usize {
    let mut units = 0;
    let mut rest = html;
    while let Some(c) = rest.chars().next() {
        match c {
            '<' => match rest.find('>') {
                Some(end) => {
                    rest = &rest[end + 1..];
                    continue;
                }
                None => units += 1,
            },
            '&' => match entity_len(rest) {
                Some(len) => {
                    units += 1;
                    rest = &rest[len..];
                    continue;
                }
                None => units += 1,
            },
            _ => units += c.len_utf16(),
        }
        rest = &rest[c.len_utf8()..];
    }
    units
}

/// Byte length of a character reference at the start of `s` (`&amp;`,
/// `&#39;`, ...), if there is one.
fn entity_len(s: &str) -> Option<usize> {
    let end = s.find(';')?;
    let name = &s[1..end];
    let valid = !name.is_empty()
        && name.len() <= 8
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '#');
    valid.then_some(end + 1)
}
