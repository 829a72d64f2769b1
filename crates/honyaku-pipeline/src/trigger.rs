//! What happens when a chat's batch is flushed.
//!
//! Rate limit → merge and cap → translate → dispatch → record. Every failure
//! is caught here, logged, and turned into a [`FlushOutcome`]; nothing
//! propagates back to the coalescer or the event handler.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use honyaku_agent::truncate::cap_chars;
use honyaku_agent::Translator;
use honyaku_core::ChatId;

use crate::batch::{merged_text, BufferedItem};
use crate::dispatch::{Delivered, Dispatcher};
use crate::limiter::RateLimiter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Delivered(Delivered),
    /// Inside the chat's minimum interval; the batch is dropped.
    RateLimited,
    TranslationFailed(String),
    DispatchFailed(String),
    Empty,
}

/// Sent after every flush when the pipeline is built with a report channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub chat: ChatId,
    pub items: usize,
    pub outcome: FlushOutcome,
}

pub struct BatchTrigger {
    limiter: Arc<RateLimiter>,
    translator: Arc<dyn Translator>,
    dispatcher: Dispatcher,
    max_chars: usize,
    truncation_marker: String,
    reports: Option<mpsc::UnboundedSender<FlushReport>>,
}

impl BatchTrigger {
    pub fn new(
        limiter: Arc<RateLimiter>,
        translator: Arc<dyn Translator>,
        dispatcher: Dispatcher,
        max_chars: usize,
        truncation_marker: impl Into<String>,
    ) -> Self {
        Self {
            limiter,
            translator,
            dispatcher,
            max_chars,
            truncation_marker: truncation_marker.into(),
            reports: None,
        }
    }

    pub fn with_reports(mut self, tx: mpsc::UnboundedSender<FlushReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Process one batch to completion and report the outcome.
    pub async fn fire(&self, chat: ChatId, batch: Vec<BufferedItem>) -> FlushOutcome {
        let items = batch.len();
        let outcome = self.run(chat, &batch).await;
        if let Some(tx) = &self.reports {
            let _ = tx.send(FlushReport {
                chat,
                items,
                outcome: outcome.clone(),
            });
        }
        outcome
    }

    async fn run(&self, chat: ChatId, batch: &[BufferedItem]) -> FlushOutcome {
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }

        if !self.limiter.try_acquire(chat) {
            debug!(%chat, items = batch.len(), "rate limited, dropping batch");
            return FlushOutcome::RateLimited;
        }

        let source = cap_chars(&merged_text(batch), self.max_chars, &self.truncation_marker);

        let translated = match self.translator.translate(&source).await {
            Ok(t) => t,
            Err(e) => {
                warn!(%chat, items = batch.len(), error = %e, "translation failed, dropping batch");
                return FlushOutcome::TranslationFailed(e.to_string());
            }
        };

        match self
            .dispatcher
            .dispatch(chat, batch, &source, &translated)
            .await
        {
            Ok(delivered) => {
                self.limiter.record(chat, Instant::now());
                info!(%chat, items = batch.len(), ?delivered, "translation delivered");
                FlushOutcome::Delivered(delivered)
            }
            Err(e) => {
                warn!(%chat, items = batch.len(), error = %e, "dispatch failed, dropping batch");
                FlushOutcome::DispatchFailed(e.to_string())
            }
        }
    }
}
