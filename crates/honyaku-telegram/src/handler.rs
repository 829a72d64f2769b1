//! Telegram message handler registered in the teloxide Dispatcher.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::User;
use tracing::trace;

use honyaku_core::{ChatId as CoreChatId, InboundEvent, MessageId as CoreMessageId};
use honyaku_pipeline::{Admission, Pipeline};

/// The account this process runs as, resolved once via `getMe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: u64,
}

impl BotIdentity {
    pub fn new(user_id: u64) -> Self {
        Self { user_id }
    }

    pub fn is_me(&self, user: Option<&User>) -> bool {
        user.is_some_and(|u| u.id.0 == self.user_id)
    }
}

/// Runs for every incoming `Message`. Never awaits network I/O: the pipeline
/// queues admitted messages and returns.
pub async fn handle_message(
    msg: Message,
    pipeline: Arc<Pipeline>,
    me: BotIdentity,
) -> ResponseResult<()> {
    let event = inbound_event(&msg, me);
    if let Admission::Dropped(reason) = pipeline.handle(&event) {
        trace!(chat = msg.chat.id.0, message = msg.id.0, %reason, "Telegram: message skipped");
    }
    Ok(())
}

/// Reduce a teloxide `Message` to an [`InboundEvent`]. Media captions stand in
/// for text.
pub fn inbound_event(msg: &Message, me: BotIdentity) -> InboundEvent {
    let from = msg.from.as_ref();
    event_from_parts(
        msg.chat.id.0,
        msg.id.0,
        from.map(|u| u.id.0),
        msg.text().or(msg.caption()).unwrap_or(""),
        me.is_me(from),
    )
}

fn event_from_parts(
    chat: i64,
    message: i32,
    sender: Option<u64>,
    text: &str,
    outgoing: bool,
) -> InboundEvent {
    let mut event = InboundEvent::new(CoreChatId(chat), CoreMessageId(message), text)
        .outgoing(outgoing);
    // Telegram user ids fit in 52 bits.
    event.sender_id = sender.map(|id| id as i64);
    event
}
