use tokio::time::Instant;

use honyaku_core::MessageId;

/// One admitted message waiting in a chat's buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedItem {
    /// Admission time. Decides which batch the item belongs to.
    pub received_at: Instant,
    /// Normalized message text.
    pub text: String,
    pub source_message_id: MessageId,
    /// Authored by the account this process runs as (editable in amend mode).
    pub from_self: bool,
}

/// Join the texts of a batch in arrival order, one per line.
pub fn merged_text(batch: &[BufferedItem]) -> String {
    batch
        .iter()
        .map(|item| item.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// The message a reply for this batch should point at: the last one.
pub fn reply_target(batch: &[BufferedItem]) -> Option<MessageId> {
    batch.last().map(|item| item.source_message_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i32, text: &str) -> BufferedItem {
        BufferedItem {
            received_at: Instant::now(),
            text: text.to_string(),
            source_message_id: MessageId(id),
            from_self: false,
        }
    }

    #[test]
    fn merged_text_keeps_arrival_order() {
        let batch = vec![item(1, "first"), item(2, "second"), item(3, "third")];
        assert_eq!(merged_text(&batch), "first\nsecond\nthird");
    }

    #[test]
    fn single_item_is_unchanged() {
        assert_eq!(merged_text(&[item(9, "only")]), "only");
    }

    #[test]
    fn reply_target_is_last_item() {
        let batch = vec![item(10, "a"), item(11, "b")];
        assert_eq!(reply_target(&batch), Some(MessageId(11)));
        assert_eq!(reply_target(&[]), None);
    }
}
