//! Storage backends for snapshots and flushed log batches.

pub mod log_sink;
pub mod snapshot_file;

pub use log_sink::{JsonlLogSink, MemoryLogSink};
pub use snapshot_file::{InMemorySnapshotStore, JsonFileSnapshotStore};
