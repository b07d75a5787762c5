//! Durable checkpoint store for listeners
//!
//! Keeps an append-only log of processing outcomes per resource type in a single
//! JSON file, rewritten atomically on every record, and answers "what was the last
//! resource processed for this type".

pub mod lock;
pub mod record;
pub mod store;

pub use lock::StoreLock;
pub use record::ProcessingRecord;
pub use store::{CheckpointError, CheckpointStore, SharedStore, StoreSummary};
