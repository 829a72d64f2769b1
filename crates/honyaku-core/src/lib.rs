pub mod config;
pub mod error;
pub mod types;

pub use error::{HonyakuError, Result};
pub use types::{ChatId, InboundEvent, MessageId};
