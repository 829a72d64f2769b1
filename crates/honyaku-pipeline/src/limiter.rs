//! Per-chat minimum spacing between outbound actions.
//!
//! Leaky, not a token bucket: a trigger inside the interval is denied and the
//! batch dropped, never queued. Only a successful dispatch advances the clock
//! for a chat, so a failed translation or send does not use up the budget.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

use honyaku_core::ChatId;

/// Number of tracked chats above which stale entries are pruned on record.
const PRUNE_ABOVE: usize = 4096;

pub struct RateLimiter {
    interval: Duration,
    last_action: DashMap<ChatId, Instant>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_action: DashMap::new(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// `true` if an action in `chat` is allowed now. Never mutates state.
    pub fn try_acquire(&self, chat: ChatId) -> bool {
        self.try_acquire_at(chat, Instant::now())
    }

    pub fn try_acquire_at(&self, chat: ChatId, now: Instant) -> bool {
        match self.last_action.get(&chat) {
            Some(last) => now.saturating_duration_since(*last) >= self.interval,
            None => true,
        }
    }

    /// Record a completed action. `last_action` only ever moves forward.
    pub fn record(&self, chat: ChatId, at: Instant) {
        self.last_action
            .entry(chat)
            .and_modify(|last| {
                if at > *last {
                    *last = at;
                }
            })
            .or_insert(at);

        if self.last_action.len() > PRUNE_ABOVE {
            let interval = self.interval;
            // Entries older than the interval no longer deny anything.
            self.last_action
                .retain(|_, last| at.saturating_duration_since(*last) < interval);
        }
    }

    pub fn last_action(&self, chat: ChatId) -> Option<Instant> {
        self.last_action.get(&chat).map(|last| *last)
    }

    pub fn tracked_chats(&self) -> usize {
        self.last_action.len()
    }
}
