//! Decides whether an inbound message is worth translating.
//!
//! Checks run in a fixed order and the first match wins:
//!
//! 1. chat not in the allow-list
//! 2. authored by this account while self-filtering is on
//! 3. not authored by this account while in amend mode
//! 4. `(chat, message)` already processed
//! 5. normalized text empty or shorter than the minimum
//! 6. normalized text already carries the translation tag
//! 7. normalized text already looks Japanese (kana count ≥ threshold)
//!
//! An admitted message is recorded as processed before this returns, so a
//! concurrent redelivery of the same message is dropped at step 4.

use std::fmt;

use tokio::time::Instant;

use honyaku_core::config::{DispatchMode, TranslatorConfig};
use honyaku_core::InboundEvent;

use crate::allow::ChatAllowList;
use crate::batch::BufferedItem;
use crate::processed::ProcessedIds;

/// Why an event was not admitted. Policy drops, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    ChatNotAllowed,
    SelfAuthored,
    NotAmendable,
    AlreadyProcessed,
    TooShort,
    AlreadyTagged,
    AlreadyTargetLanguage,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ChatNotAllowed => "chat-not-allowed",
            Self::SelfAuthored => "self-authored",
            Self::NotAmendable => "not-amendable",
            Self::AlreadyProcessed => "already-processed",
            Self::TooShort => "too-short",
            Self::AlreadyTagged => "already-tagged",
            Self::AlreadyTargetLanguage => "already-target-language",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Admit(BufferedItem),
    Drop(DropReason),
}

pub struct Classifier {
    allow: ChatAllowList,
    filter_self: bool,
    mode: DispatchMode,
    min_text_chars: usize,
    kana_threshold: usize,
    tag: String,
    processed: ProcessedIds,
}

impl Classifier {
    pub fn new(config: &TranslatorConfig) -> Self {
        Self {
            allow: ChatAllowList::new(&config.allow_chats),
            filter_self: config.filter_self,
            mode: config.mode,
            min_text_chars: config.min_text_chars,
            kana_threshold: config.kana_threshold,
            // Compared against normalized text, so normalize the tag the same way.
            tag: normalize(&config.translation_tag),
            processed: ProcessedIds::new(config.processed_capacity),
        }
    }

    pub fn processed(&self) -> &ProcessedIds {
        &self.processed
    }

    pub fn classify(&self, event: &InboundEvent) -> Verdict {
        match self.check(event) {
            Err(reason) => Verdict::Drop(reason),
            Ok(text) => {
                if !self.processed.insert(event.chat_id, event.message_id) {
                    return Verdict::Drop(DropReason::AlreadyProcessed);
                }
                Verdict::Admit(BufferedItem {
                    received_at: Instant::now(),
                    text,
                    source_message_id: event.message_id,
                    from_self: event.is_outgoing,
                })
            }
        }
    }

    /// Run every check; on success return the normalized text.
    fn check(&self, event: &InboundEvent) -> Result<String, DropReason> {
        if !self.allow.is_allowed(event.chat_id) {
            return Err(DropReason::ChatNotAllowed);
        }
        if self.filter_self && event.is_outgoing {
            return Err(DropReason::SelfAuthored);
        }
        if self.mode == DispatchMode::Amend && !event.is_outgoing {
            return Err(DropReason::NotAmendable);
        }
        if self.processed.contains(event.chat_id, event.message_id) {
            return Err(DropReason::AlreadyProcessed);
        }

        let text = normalize(&event.text);
        if text.chars().count() < self.min_text_chars.max(1) {
            return Err(DropReason::TooShort);
        }
        if text.contains(&self.tag) {
            return Err(DropReason::AlreadyTagged);
        }
        if looks_japanese(&text, self.kana_threshold) {
            return Err(DropReason::AlreadyTargetLanguage);
        }
        Ok(text)
    }
}

/// Collapse whitespace runs to a single space and trim both ends.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hiragana and katakana, `U+3040..=U+30FF`. Kanji is shared with Chinese
/// and deliberately not counted.
pub fn is_kana(c: char) -> bool {
    ('\u{3040}'..='\u{30FF}').contains(&c)
}

pub fn count_kana(text: &str) -> usize {
    text.chars().filter(|&c| is_kana(c)).count()
}

pub fn looks_japanese(text: &str, threshold: usize) -> bool {
    count_kana(text) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;
    use honyaku_core::{ChatId, MessageId};

    const TAG: &str = "\u{200B}\u{2063}\u{200B}";

    fn config() -> TranslatorConfig {
        TranslatorConfig {
            translation_tag: TAG.to_string(),
            ..TranslatorConfig::default()
        }
    }

    fn event(id: i32, text: &str) -> InboundEvent {
        InboundEvent::new(ChatId(10), MessageId(id), text).from_sender(77)
    }

    fn reason(verdict: Verdict) -> Option<DropReason> {
        match verdict {
            Verdict::Drop(r) => Some(r),
            Verdict::Admit(_) => None,
        }
    }

    #[test]
    fn plain_text_is_admitted_normalized() {
        let c = Classifier::new(&config());
        match c.classify(&event(1, "  hello \n\t there  ")) {
            Verdict::Admit(item) => {
                assert_eq!(item.text, "hello there");
                assert_eq!(item.source_message_id, MessageId(1));
                assert!(!item.from_self);
            }
            other => panic!("expected admit, got {other:?}"),
        }
    }

    #[test]
    fn chat_outside_allow_list_is_dropped_first() {
        let c = Classifier::new(&TranslatorConfig {
            allow_chats: vec![99],
            ..config()
        });
        // Also self-authored and tagged: allow-list still wins.
        let ev = event(1, &format!("hi{TAG}")).outgoing(true);
        assert_eq!(reason(c.classify(&ev)), Some(DropReason::ChatNotAllowed));
    }

    #[test]
    fn self_authored_is_dropped_when_filtering() {
        let c = Classifier::new(&config());
        let ev = event(1, "hello").outgoing(true);
        assert_eq!(reason(c.classify(&ev)), Some(DropReason::SelfAuthored));

        let c = Classifier::new(&TranslatorConfig {
            filter_self: false,
            ..config()
        });
        assert_eq!(reason(c.classify(&ev)), None);
    }

    #[test]
    fn amend_mode_only_admits_own_messages() {
        let c = Classifier::new(&TranslatorConfig {
            mode: DispatchMode::Amend,
            filter_self: false,
            ..config()
        });
        assert_eq!(
            reason(c.classify(&event(1, "hello"))),
            Some(DropReason::NotAmendable)
        );
        match c.classify(&event(2, "hello").outgoing(true)) {
            Verdict::Admit(item) => assert!(item.from_self),
            other => panic!("expected admit, got {other:?}"),
        }
    }

    #[test]
    fn repeated_delivery_admits_once() {
        let c = Classifier::new(&config());
        let ev = event(5, "hello there");
        let admits = (0..5)
            .filter(|_| matches!(c.classify(&ev), Verdict::Admit(_)))
            .count();
        assert_eq!(admits, 1);
        assert_eq!(
            reason(c.classify(&ev)),
            Some(DropReason::AlreadyProcessed)
        );
    }

    #[test]
    fn dropped_message_is_not_marked_processed() {
        let c = Classifier::new(&config());
        assert_eq!(reason(c.classify(&event(1, "a"))), Some(DropReason::TooShort));
        assert!(!c.processed().contains(ChatId(10), MessageId(1)));
    }

    #[test]
    fn empty_and_short_text_dropped() {
        let c = Classifier::new(&config());
        assert_eq!(reason(c.classify(&event(1, ""))), Some(DropReason::TooShort));
        assert_eq!(reason(c.classify(&event(2, "   \n "))), Some(DropReason::TooShort));
        assert_eq!(reason(c.classify(&event(3, " k "))), Some(DropReason::TooShort));
        assert_eq!(reason(c.classify(&event(4, "ok"))), None);
    }

    #[test]
    fn tagged_text_is_always_dropped() {
        let c = Classifier::new(&config());
        let samples = [
            format!("hello\n<blockquote>やあ</blockquote>{TAG}"),
            format!("{TAG}anything at all"),
            format!("mid {TAG} dle"),
            format!("   spaced out   {TAG}   "),
        ];
        for (i, text) in samples.iter().enumerate() {
            let verdict = c.classify(&event(100 + i as i32, text));
            assert_eq!(reason(verdict), Some(DropReason::AlreadyTagged), "sample {i}");
        }
    }

    #[test]
    fn refeeding_system_output_never_admits() {
        let c = Classifier::new(&config());
        let output = format!("hello there\n<blockquote>こんにちは</blockquote>{TAG}");
        // A fresh message id each time: the tag alone must stop it.
        for id in 0..10 {
            assert!(matches!(c.classify(&event(id, &output)), Verdict::Drop(_)));
        }
    }

    #[test]
    fn kana_threshold_boundary() {
        let c = Classifier::new(&TranslatorConfig {
            kana_threshold: 4,
            ..config()
        });
        // 3 kana: below threshold, translated.
        assert_eq!(reason(c.classify(&event(1, "ok ありが"))), None);
        // 4 kana: at threshold, treated as already Japanese.
        assert_eq!(
            reason(c.classify(&event(2, "ok ありがと"))),
            Some(DropReason::AlreadyTargetLanguage)
        );
    }

    #[test]
    fn kanji_and_latin_do_not_count_as_kana() {
        assert_eq!(count_kana("漢字 only latin"), 0);
        assert_eq!(count_kana("カタカナ"), 4);
        assert_eq!(count_kana("ひらがな"), 4);
        assert!(!looks_japanese("今日 天気", 1));
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "",
            "   ",
            "hello",
            "  hello   there  ",
            "line one\nline two\r\n\tline three",
            "\u{3000}全角\u{3000}スペース\u{3000}",
            "tag\u{200B}\u{2063}\u{200B}kept",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input {s:?}");
        }
        assert_eq!(normalize("  a \n\n b  "), "a b");
        assert_eq!(normalize("tag\u{200B}x"), "tag\u{200B}x");
    }
}
