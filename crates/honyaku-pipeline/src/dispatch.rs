//! Delivers a finished translation back to the chat.
//!
//! Payloads are rich text in Telegram's HTML dialect: the source text, then
//! the translation inside `<blockquote>`. Both parts are HTML-escaped.
//!
//! | Mode  | Action                                   | Payload suffix    |
//! |-------|------------------------------------------|-------------------|
//! | Reply | new message replying to the batch's last | none              |
//! | Amend | edit of the (self-authored) original     | translation tag   |

use std::sync::Arc;

use async_trait::async_trait;

use honyaku_core::config::DispatchMode;
use honyaku_core::{ChatId, MessageId};

use crate::batch::{reply_target, BufferedItem};
use crate::error::{DispatchError, PlatformError};

/// Outbound side of the chat platform.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Send `html` to `chat`, optionally as a reply. Returns the new message's ID.
    async fn emit(
        &self,
        chat: ChatId,
        html: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, PlatformError>;

    /// Replace the content of `message` in `chat` with `html`.
    async fn amend(&self, chat: ChatId, message: MessageId, html: &str)
        -> Result<(), PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivered {
    Amended(MessageId),
    Replied(MessageId),
}

pub struct Dispatcher {
    platform: Arc<dyn Platform>,
    mode: DispatchMode,
    tag: String,
}

impl Dispatcher {
    pub fn new(platform: Arc<dyn Platform>, mode: DispatchMode, tag: impl Into<String>) -> Self {
        Self {
            platform,
            mode,
            tag: tag.into(),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Deliver `translated` for `batch`. `source` is the exact text that was
    /// translated (merged and capped).
    pub async fn dispatch(
        &self,
        chat: ChatId,
        batch: &[BufferedItem],
        source: &str,
        translated: &str,
    ) -> Result<Delivered, DispatchError> {
        match self.mode {
            DispatchMode::Reply => {
                let target = reply_target(batch).ok_or(DispatchError::EmptyBatch)?;
                let html = render_reply(source, translated);
                let sent = self.platform.emit(chat, &html, Some(target)).await?;
                Ok(Delivered::Replied(sent))
            }
            DispatchMode::Amend => {
                let item = match batch {
                    [] => return Err(DispatchError::EmptyBatch),
                    [item] => item,
                    _ => return Err(DispatchError::MergedAmend { items: batch.len() }),
                };
                if !item.from_self {
                    return Err(DispatchError::NotAmendable {
                        message: item.source_message_id,
                    });
                }
                let html = render_amend(source, translated, &self.tag);
                self.platform
                    .amend(chat, item.source_message_id, &html)
                    .await?;
                Ok(Delivered::Amended(item.source_message_id))
            }
        }
    }
}

/// Escape special HTML characters for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// `source` followed by the quoted translation.
pub fn render_reply(source: &str, translated: &str) -> String {
    format!(
        "{}\n<blockquote>{}</blockquote>",
        escape_html(source),
        escape_html(translated)
    )
}

/// Like [`render_reply`] with the loop-guard tag appended.
pub fn render_amend(source: &str, translated: &str, tag: &str) -> String {
    format!("{}{}", render_reply(source, translated), tag)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Emit(ChatId, String, Option<MessageId>),
        Amend(ChatId, MessageId, String),
    }

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<Call>>,
        fail: bool,
    }

    #[async_trait]
    impl Platform for Recorder {
        async fn emit(
            &self,
            chat: ChatId,
            html: &str,
            reply_to: Option<MessageId>,
        ) -> Result<MessageId, PlatformError> {
            if self.fail {
                return Err(PlatformError::SendFailed("boom".into()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(Call::Emit(chat, html.to_string(), reply_to));
            Ok(MessageId(900))
        }

        async fn amend(
            &self,
            chat: ChatId,
            message: MessageId,
            html: &str,
        ) -> Result<(), PlatformError> {
            if self.fail {
                return Err(PlatformError::EditFailed("boom".into()));
            }
            self.calls
                .lock()
                .unwrap()
                .push(Call::Amend(chat, message, html.to_string()));
            Ok(())
        }
    }

    fn item(id: i32, text: &str, from_self: bool) -> BufferedItem {
        BufferedItem {
            received_at: Instant::now(),
            text: text.to_string(),
            source_message_id: MessageId(id),
            from_self,
        }
    }

    #[test]
    fn escape_html_handles_special_chars() {
        assert_eq!(escape_html("a < b & c > d"), "a &lt; b &amp; c &gt; d");
        assert_eq!(escape_html("no specials"), "no specials");
        assert_eq!(escape_html(""), "");
    }

    #[test]
    fn reply_payload_shape() {
        assert_eq!(
            render_reply("hello there", "やあ"),
            "hello there\n<blockquote>やあ</blockquote>"
        );
        assert_eq!(
            render_reply("<b>", "&"),
            "&lt;b&gt;\n<blockquote>&amp;</blockquote>"
        );
    }

    #[test]
    fn amend_payload_ends_with_tag() {
        let html = render_amend("hi", "やあ", "#tag");
        assert_eq!(html, "hi\n<blockquote>やあ</blockquote>#tag");
    }

    #[tokio::test]
    async fn reply_targets_last_item() {
        let rec = Arc::new(Recorder::default());
        let d = Dispatcher::new(rec.clone(), DispatchMode::Reply, "#tag");
        let batch = vec![item(1, "a", false), item(2, "b", false)];

        let out = d.dispatch(ChatId(5), &batch, "a\nb", "translated").await.unwrap();
        assert_eq!(out, Delivered::Replied(MessageId(900)));
        assert_eq!(
            rec.calls.lock().unwrap().as_slice(),
            &[Call::Emit(
                ChatId(5),
                "a\nb\n<blockquote>translated</blockquote>".to_string(),
                Some(MessageId(2))
            )]
        );
    }

    #[tokio::test]
    async fn amend_edits_own_message_with_tag() {
        let rec = Arc::new(Recorder::default());
        let d = Dispatcher::new(rec.clone(), DispatchMode::Amend, "#tag");
        let batch = vec![item(7, "hello", true)];

        let out = d.dispatch(ChatId(5), &batch, "hello", "やあ").await.unwrap();
        assert_eq!(out, Delivered::Amended(MessageId(7)));
        assert_eq!(
            rec.calls.lock().unwrap().as_slice(),
            &[Call::Amend(
                ChatId(5),
                MessageId(7),
                "hello\n<blockquote>やあ</blockquote>#tag".to_string()
            )]
        );
    }

    #[tokio::test]
    async fn amend_refuses_foreign_message() {
        let rec = Arc::new(Recorder::default());
        let d = Dispatcher::new(rec.clone(), DispatchMode::Amend, "#tag");
        let err = d
            .dispatch(ChatId(5), &[item(7, "hello", false)], "hello", "やあ")
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotAmendable { message: MessageId(7) }));
        assert!(rec.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn amend_refuses_merged_batch() {
        let rec = Arc::new(Recorder::default());
        let d = Dispatcher::new(rec, DispatchMode::Amend, "#tag");
        let batch = vec![item(1, "a", true), item(2, "b", true)];
        let err = d.dispatch(ChatId(5), &batch, "a\nb", "x").await.unwrap_err();
        assert!(matches!(err, DispatchError::MergedAmend { items: 2 }));
    }

    #[tokio::test]
    async fn empty_batch_is_rejected() {
        let rec = Arc::new(Recorder::default());
        let d = Dispatcher::new(rec, DispatchMode::Reply, "#tag");
        let err = d.dispatch(ChatId(5), &[], "", "x").await.unwrap_err();
        assert!(matches!(err, DispatchError::EmptyBatch));
    }

    #[tokio::test]
    async fn platform_failure_propagates() {
        let rec = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let d = Dispatcher::new(rec, DispatchMode::Reply, "#tag");
        let err = d
            .dispatch(ChatId(5), &[item(1, "a", false)], "a", "x")
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Platform(PlatformError::SendFailed(_))));
    }
}
