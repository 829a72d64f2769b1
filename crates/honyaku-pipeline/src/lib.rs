//! honyaku-pipeline — decides when and what to translate.
//!
//! An inbound event flows through:
//!
//! 1. [`classify`]: allow-list, self-origin, de-duplication, length, loop tag
//!    and kana heuristic. Admitted events become a [`BufferedItem`].
//! 2. [`coalescer`]: one actor per chat merges items arriving within the
//!    merge window into a single batch.
//! 3. [`trigger`]: rate limit, character cap, translation, dispatch.
//! 4. [`dispatch`]: edit the original message or reply with the translation.
//!
//! [`Pipeline`] wires these together behind a single `handle(event)` call
//! that never blocks on network I/O.

pub mod allow;
pub mod batch;
pub mod classify;
pub mod coalescer;
pub mod dispatch;
pub mod error;
pub mod limiter;
pub mod pipeline;
pub mod processed;
pub mod trigger;

pub use batch::BufferedItem;
pub use classify::{Classifier, DropReason, Verdict};
pub use coalescer::{ChatPhase, Coalescer};
pub use dispatch::{Delivered, Dispatcher, Platform};
pub use error::{DispatchError, PlatformError};
pub use limiter::RateLimiter;
pub use pipeline::{Admission, Pipeline};
pub use trigger::{BatchTrigger, FlushOutcome, FlushReport};
