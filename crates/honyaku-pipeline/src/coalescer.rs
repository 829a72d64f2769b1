//! Per-chat coalescing actors.
//!
//! Every chat with recent traffic owns one tokio task fed by an unbounded
//! channel. The task is the only writer of that chat's buffer and moves
//! through three phases:
//!
//! ```text
//!   Idle ──first item──▶ Buffering ──deadline──▶ Flushing ──done──▶ Idle
//!                         ▲     │
//!                         └─────┘ items admitted before the deadline join
//! ```
//!
//! The deadline is fixed when the first item of a batch was admitted
//! (`received_at + window`) and is not pushed back by later arrivals, so a
//! burst waits at most one window. The actor awaits the flush before it
//! returns to `Idle`: batches from one chat never overlap and keep arrival
//! order. Items admitted while a flush is running wait in the channel and
//! form the next batch.
//!
//! A window of zero turns every item into its own batch.
//!
//! Actors exit after `idle` without traffic and are re-spawned on demand.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, timeout};
use tracing::debug;

use honyaku_core::ChatId;

use crate::batch::BufferedItem;
use crate::trigger::BatchTrigger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChatPhase {
    Idle = 0,
    Buffering = 1,
    Flushing = 2,
}

impl ChatPhase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Buffering,
            2 => Self::Flushing,
            _ => Self::Idle,
        }
    }
}

struct ChatSlot {
    tx: mpsc::UnboundedSender<BufferedItem>,
    generation: u64,
    phase: Arc<AtomicU8>,
}

struct Shared {
    window: Duration,
    idle: Duration,
    trigger: BatchTrigger,
    chats: DashMap<ChatId, ChatSlot>,
    generations: AtomicU64,
}

#[derive(Clone)]
pub struct Coalescer {
    shared: Arc<Shared>,
}

impl Coalescer {
    pub fn new(window: Duration, idle: Duration, trigger: BatchTrigger) -> Self {
        Self {
            shared: Arc::new(Shared {
                window,
                idle,
                trigger,
                chats: DashMap::new(),
                generations: AtomicU64::new(0),
            }),
        }
    }

    pub fn window(&self) -> Duration {
        self.shared.window
    }

    pub fn trigger(&self) -> &BatchTrigger {
        &self.shared.trigger
    }

    /// Hand `item` to the chat's actor, spawning one if needed.
    ///
    /// Must be called from within a tokio runtime. Never waits on I/O.
    pub fn admit(&self, chat: ChatId, mut item: BufferedItem) {
        loop {
            let tx = self
                .shared
                .chats
                .entry(chat)
                .or_insert_with(|| self.spawn(chat))
                .tx
                .clone();

            match tx.send(item) {
                Ok(()) => return,
                Err(mpsc::error::SendError(returned)) => {
                    // The actor retired between lookup and send. Drop its slot
                    // (unless a fresh one already replaced it) and retry.
                    item = returned;
                    self.shared
                        .chats
                        .remove_if(&chat, |_, slot| slot.tx.same_channel(&tx));
                }
            }
        }
    }

    /// Current phase of `chat`'s actor, `None` if it has none.
    pub fn phase(&self, chat: ChatId) -> Option<ChatPhase> {
        self.shared
            .chats
            .get(&chat)
            .map(|slot| ChatPhase::from_u8(slot.phase.load(Ordering::Acquire)))
    }

    pub fn active_chats(&self) -> usize {
        self.shared.chats.len()
    }

    fn spawn(&self, chat: ChatId) -> ChatSlot {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = self.shared.generations.fetch_add(1, Ordering::Relaxed);
        let phase = Arc::new(AtomicU8::new(ChatPhase::Idle as u8));

        let actor = ChatActor {
            shared: Arc::clone(&self.shared),
            chat,
            generation,
            phase: Arc::clone(&phase),
            rx,
        };
        tokio::spawn(actor.run());
        debug!(%chat, generation, "chat actor spawned");

        ChatSlot {
            tx,
            generation,
            phase,
        }
    }
}

struct ChatActor {
    shared: Arc<Shared>,
    chat: ChatId,
    generation: u64,
    phase: Arc<AtomicU8>,
    rx: mpsc::UnboundedReceiver<BufferedItem>,
}

impl ChatActor {
    async fn run(mut self) {
        let window = self.shared.window;
        // An item that arrived after the previous batch's deadline.
        let mut carry: Option<BufferedItem> = None;
        let mut retiring = false;

        loop {
            self.set_phase(ChatPhase::Idle);
            let first = match carry.take() {
                Some(item) => item,
                None if retiring => match self.rx.recv().await {
                    Some(item) => item,
                    None => break,
                },
                None => match timeout(self.shared.idle, self.rx.recv()).await {
                    Ok(Some(item)) => item,
                    Ok(None) => break,
                    Err(_) => {
                        self.retire();
                        retiring = true;
                        continue;
                    }
                },
            };

            let mut batch = vec![first];
            if !window.is_zero() {
                self.set_phase(ChatPhase::Buffering);
                let deadline = batch[0].received_at + window;
                loop {
                    tokio::select! {
                        biased;
                        next = self.rx.recv() => match next {
                            Some(item) if item.received_at <= deadline => batch.push(item),
                            Some(item) => {
                                carry = Some(item);
                                break;
                            }
                            None => {
                                sleep_until(deadline).await;
                                break;
                            }
                        },
                        _ = sleep_until(deadline) => break,
                    }
                }
            }

            self.set_phase(ChatPhase::Flushing);
            debug!(chat = %self.chat, items = batch.len(), "flushing batch");
            self.shared.trigger.fire(self.chat, batch).await;
        }

        debug!(chat = %self.chat, generation = self.generation, "chat actor stopped");
    }

    /// Leave the chat map and stop accepting items. Items already queued are
    /// still processed before the task ends.
    fn retire(&mut self) {
        let generation = self.generation;
        self.shared
            .chats
            .remove_if(&self.chat, |_, slot| slot.generation == generation);
        self.rx.close();
        debug!(chat = %self.chat, generation, "chat actor idle, retiring");
    }

    fn set_phase(&self, phase: ChatPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::time::{sleep, Instant};

    use honyaku_agent::{TranslationError, Translator};
    use honyaku_core::config::DispatchMode;
    use honyaku_core::MessageId;

    use super::*;
    use crate::dispatch::{Dispatcher, Platform};
    use crate::error::PlatformError;
    use crate::limiter::RateLimiter;
    use crate::trigger::{FlushOutcome, FlushReport};

    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Translator for Echo {
        async fn translate(&self, text: &str) -> Result<String, TranslationError> {
            self.seen.lock().unwrap().push(text.to_string());
            Ok(format!("T({text})"))
        }
    }

    struct Sink;

    #[async_trait]
    impl Platform for Sink {
        async fn emit(
            &self,
            _chat: ChatId,
            _html: &str,
            reply_to: Option<MessageId>,
        ) -> Result<MessageId, PlatformError> {
            Ok(reply_to.unwrap_or(MessageId(0)))
        }

        async fn amend(&self, _: ChatId, _: MessageId, _: &str) -> Result<(), PlatformError> {
            Ok(())
        }
    }

    fn coalescer(
        window: Duration,
        idle: Duration,
    ) -> (Coalescer, Arc<Echo>, UnboundedReceiver<FlushReport>) {
        let echo = Arc::new(Echo::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let trigger = BatchTrigger::new(
            Arc::new(RateLimiter::new(Duration::ZERO)),
            echo.clone(),
            Dispatcher::new(Arc::new(Sink), DispatchMode::Reply, "#"),
            1500,
            "…",
        )
        .with_reports(tx);
        (Coalescer::new(window, idle, trigger), echo, rx)
    }

    fn item(id: i32, text: &str) -> BufferedItem {
        BufferedItem {
            received_at: Instant::now(),
            text: text.to_string(),
            source_message_id: MessageId(id),
            from_self: false,
        }
    }

    const WINDOW: Duration = Duration::from_millis(1200);
    const IDLE: Duration = Duration::from_secs(600);

    #[tokio::test(start_paused = true)]
    async fn burst_inside_window_is_one_batch() {
        let (c, echo, mut reports) = coalescer(WINDOW, IDLE);
        let chat = ChatId(1);

        c.admit(chat, item(1, "a"));
        sleep(Duration::from_millis(300)).await;
        assert_eq!(c.phase(chat), Some(ChatPhase::Buffering));
        c.admit(chat, item(2, "b"));
        sleep(Duration::from_millis(300)).await;
        c.admit(chat, item(3, "c"));

        let report = reports.recv().await.unwrap();
        assert_eq!(report.items, 3);
        assert_eq!(
            report.outcome,
            FlushOutcome::Delivered(crate::dispatch::Delivered::Replied(MessageId(3)))
        );
        assert_eq!(echo.seen.lock().unwrap().as_slice(), &["a\nb\nc".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_is_not_extended_by_late_items() {
        let (c, echo, mut reports) = coalescer(WINDOW, IDLE);
        let chat = ChatId(1);
        let start = Instant::now();

        c.admit(chat, item(1, "a"));
        for id in 2..=4 {
            sleep(Duration::from_millis(500)).await;
            c.admit(chat, item(id, "x"));
        }

        let first = reports.recv().await.unwrap();
        // a, x@500ms, x@1000ms; x@1500ms misses the 1200ms deadline.
        assert_eq!(first.items, 3);
        let second = reports.recv().await.unwrap();
        assert_eq!(second.items, 1);
        assert!(Instant::now() - start >= Duration::from_millis(1500) + WINDOW);
        assert_eq!(echo.seen.lock().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_window_flushes_each_item() {
        let (c, echo, mut reports) = coalescer(Duration::ZERO, IDLE);
        let chat = ChatId(1);
        for id in 1..=3 {
            c.admit(chat, item(id, &format!("m{id}")));
        }
        for _ in 0..3 {
            assert_eq!(reports.recv().await.unwrap().items, 1);
        }
        assert_eq!(
            echo.seen.lock().unwrap().as_slice(),
            &["m1".to_string(), "m2".to_string(), "m3".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn chats_are_buffered_independently() {
        let (c, _echo, mut reports) = coalescer(WINDOW, IDLE);
        c.admit(ChatId(1), item(1, "a"));
        c.admit(ChatId(2), item(1, "b"));
        c.admit(ChatId(1), item(2, "c"));

        let mut got = vec![reports.recv().await.unwrap(), reports.recv().await.unwrap()];
        got.sort_by_key(|r| r.chat);
        assert_eq!((got[0].chat, got[0].items), (ChatId(1), 2));
        assert_eq!((got[1].chat, got[1].items), (ChatId(2), 1));
        assert_eq!(c.active_chats(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_actor_retires_and_respawns() {
        let idle = Duration::from_secs(10);
        let (c, _echo, mut reports) = coalescer(WINDOW, idle);
        let chat = ChatId(1);

        c.admit(chat, item(1, "a"));
        reports.recv().await.unwrap();
        assert_eq!(c.phase(chat), Some(ChatPhase::Idle));

        sleep(idle + Duration::from_secs(1)).await;
        assert_eq!(c.active_chats(), 0);
        assert_eq!(c.phase(chat), None);

        c.admit(chat, item(2, "b"));
        assert_eq!(reports.recv().await.unwrap().items, 1);
    }
}
