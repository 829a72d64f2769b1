use thiserror::Error;

use honyaku_core::MessageId;

/// Failure reported by a chat platform for a send or edit call.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("edit failed: {0}")]
    EditFailed(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("message {message} was not authored by this account and cannot be edited")]
    NotAmendable { message: MessageId },

    #[error("amend mode edits one message at a time, got a batch of {items}")]
    MergedAmend { items: usize },

    #[error("nothing to dispatch")]
    EmptyBatch,
}
