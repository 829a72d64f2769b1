//! Background consumer of flush reports: per-outcome counters, logged
//! periodically.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use honyaku_pipeline::{FlushOutcome, FlushReport};

const SUMMARY_EVERY: Duration = Duration::from_secs(600);

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub delivered: u64,
    pub rate_limited: u64,
    pub translation_failed: u64,
    pub dispatch_failed: u64,
    pub messages: u64,
}

impl Tally {
    pub fn record(&mut self, report: &FlushReport) {
        match report.outcome {
            FlushOutcome::Delivered(_) => {
                self.delivered += 1;
                self.messages += report.items as u64;
            }
            FlushOutcome::RateLimited => self.rate_limited += 1,
            FlushOutcome::TranslationFailed(_) => self.translation_failed += 1,
            FlushOutcome::DispatchFailed(_) => self.dispatch_failed += 1,
            FlushOutcome::Empty => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Drain `rx` until every sender is gone. Logs a summary every
/// [`SUMMARY_EVERY`] when something happened.
pub async fn log_reports(mut rx: UnboundedReceiver<FlushReport>) {
    let mut tally = Tally::default();
    let mut ticker = interval(SUMMARY_EVERY);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            report = rx.recv() => match report {
                Some(report) => tally.record(&report),
                None => break,
            },
            _ = ticker.tick() => {
                if !tally.is_empty() {
                    log_summary(&tally);
                    tally = Tally::default();
                }
            }
        }
    }

    if !tally.is_empty() {
        log_summary(&tally);
    }
}

fn log_summary(t: &Tally) {
    info!(
        delivered = t.delivered,
        messages = t.messages,
        rate_limited = t.rate_limited,
        translation_failed = t.translation_failed,
        dispatch_failed = t.dispatch_failed,
        "flush summary"
    );
}
