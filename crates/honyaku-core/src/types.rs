use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform-native chat identifier (Telegram chat IDs are signed 64-bit).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Platform-native message identifier. Only unique within its chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i32);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for MessageId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// A message delivered by the chat platform, reduced to what the translator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub chat_id: ChatId,

    /// Sender's platform user ID. `None` for anonymous channel posts.
    pub sender_id: Option<i64>,

    pub message_id: MessageId,

    /// Raw message text (or media caption). May be empty.
    pub text: String,

    /// `true` when the message was authored by the account this process runs as.
    pub is_outgoing: bool,
}

impl InboundEvent {
    pub fn new(chat_id: ChatId, message_id: MessageId, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            sender_id: None,
            message_id,
            text: text.into(),
            is_outgoing: false,
        }
    }

    pub fn from_sender(mut self, sender_id: i64) -> Self {
        self.sender_id = Some(sender_id);
        self
    }

    pub fn outgoing(mut self, is_outgoing: bool) -> Self {
        self.is_outgoing = is_outgoing;
        self
    }
}
