//! Durable state for the sync engine: the watermark cursor, the pending-work
//! queue, and the block list. Each concern is one JSON document rewritten in
//! full on every change.

pub mod blocklist;
pub mod document;
pub mod pending;
pub mod watermark;

pub use blocklist::{BlockList, BlockListFilter};
pub use document::JsonDocument;
pub use pending::{PendingQueueStore, PendingRecord};
pub use watermark::{Watermark, WatermarkStore};
