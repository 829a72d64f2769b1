//! Chat allow-list.
//!
//! Allow-by-default: an empty list means every chat is served. A non-empty
//! list restricts the translator to exactly those chat IDs.

use std::collections::HashSet;

use honyaku_core::ChatId;

#[derive(Debug, Clone, Default)]
pub struct ChatAllowList {
    chats: HashSet<i64>,
}

impl ChatAllowList {
    pub fn new(chats: &[i64]) -> Self {
        Self {
            chats: chats.iter().copied().collect(),
        }
    }

    /// Returns `true` when the translator may act in `chat`.
    pub fn is_allowed(&self, chat: ChatId) -> bool {
        self.chats.is_empty() || self.chats.contains(&chat.0)
    }

    pub fn is_open(&self) -> bool {
        self.chats.is_empty()
    }
}
