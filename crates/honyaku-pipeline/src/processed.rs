//! Bounded memory of message IDs already admitted.
//!
//! Keys are `(chat, message)` pairs because Telegram message IDs are only
//! unique within a chat. The oldest entries are evicted once `capacity` is
//! reached; a redelivery that old is no longer expected.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;

use honyaku_core::{ChatId, MessageId};

pub struct ProcessedIds {
    seen: Mutex<LruCache<(ChatId, MessageId), ()>>,
}

impl ProcessedIds {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            seen: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Check without recording or refreshing the entry.
    pub fn contains(&self, chat: ChatId, message: MessageId) -> bool {
        self.lock().contains(&(chat, message))
    }

    /// Record `(chat, message)`. Returns `false` if it was already present,
    /// which means another handler admitted it first.
    pub fn insert(&self, chat: ChatId, message: MessageId) -> bool {
        let mut seen = self.lock();
        if seen.get(&(chat, message)).is_some() {
            return false;
        }
        seen.put((chat, message), ());
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<(ChatId, MessageId), ()>> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
