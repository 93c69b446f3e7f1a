//! Anima memory
//!
//! An ordered, hard-capped log of [`MemoryEntry`] values with weight decay
//! and an archival eviction pass. Appends past capacity drop the oldest
//! entries; only [`MemoryStore::batch_maintain`] moves entries into the
//! [`Archive`].

#![deny(unsafe_code)]

pub mod archive;
pub mod entry;
pub mod error;
pub mod store;

pub use archive::Archive;
pub use entry::{MemoryEntry, MemoryId};
pub use error::{MemoryError, Result};
pub use store::{
    ArchiveCriteria, MaintenancePolicy, MaintenanceReport, MemoryStats, MemoryStore,
    MemoryStoreConfig,
};
