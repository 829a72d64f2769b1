use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use honyaku_agent::Translator;
use honyaku_core::config::TranslatorConfig;
use honyaku_core::InboundEvent;

use crate::classify::{Classifier, DropReason, Verdict};
use crate::coalescer::Coalescer;
use crate::dispatch::{Dispatcher, Platform};
use crate::limiter::RateLimiter;
use crate::trigger::{BatchTrigger, FlushReport};

/// Result of handing one event to the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Dropped(DropReason),
}

/// Classifier, coalescer and trigger wired together for one bot account.
pub struct Pipeline {
    classifier: Classifier,
    coalescer: Coalescer,
    limiter: Arc<RateLimiter>,
}

impl Pipeline {
    /// `reports`, when given, receives a [`FlushReport`] after every flush.
    pub fn new(
        config: &TranslatorConfig,
        translator: Arc<dyn Translator>,
        platform: Arc<dyn Platform>,
        reports: Option<mpsc::UnboundedSender<FlushReport>>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.min_interval()));
        let dispatcher = Dispatcher::new(platform, config.mode, config.translation_tag.clone());

        let mut trigger = BatchTrigger::new(
            Arc::clone(&limiter),
            translator,
            dispatcher,
            config.max_chars,
            config.truncation_marker.clone(),
        );
        if let Some(tx) = reports {
            trigger = trigger.with_reports(tx);
        }

        Self {
            classifier: Classifier::new(config),
            coalescer: Coalescer::new(config.merge_window(), config.chat_idle(), trigger),
            limiter,
        }
    }

    /// Classify `event` and, if admitted, queue it on its chat's actor.
    ///
    /// Returns immediately; translation and delivery happen in the background.
    pub fn handle(&self, event: &InboundEvent) -> Admission {
        match self.classifier.classify(event) {
            Verdict::Drop(reason) => {
                debug!(
                    chat = %event.chat_id,
                    message = %event.message_id,
                    %reason,
                    "event dropped"
                );
                Admission::Dropped(reason)
            }
            Verdict::Admit(item) => {
                debug!(
                    chat = %event.chat_id,
                    message = %event.message_id,
                    chars = item.text.chars().count(),
                    "event admitted"
                );
                self.coalescer.admit(event.chat_id, item);
                Admission::Admitted
            }
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn coalescer(&self) -> &Coalescer {
        &self.coalescer
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}
