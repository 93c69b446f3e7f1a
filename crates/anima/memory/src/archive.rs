//! Immutable overflow store for entries evicted by maintenance.

use std::collections::VecDeque;
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::entry::MemoryEntry;

/// Capacity-bounded archive. Entries are never modified and never move back
/// into the store. When full, the oldest archived entries are dropped.
#[derive(Debug, Clone)]
pub struct Archive {
    entries: VecDeque<MemoryEntry>,
    capacity: usize,
    dropped: u64,
}

impl Archive {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Bulk insert, preserving order.
    pub fn extend(&mut self, entries: Vec<MemoryEntry>) {
        let incoming = entries.len();
        self.entries.extend(entries);
        let overflow = self.entries.len().saturating_sub(self.capacity);
        if overflow > 0 {
            self.entries.drain(..overflow);
            self.dropped += overflow as u64;
            debug!(overflow, incoming, "Archive full, dropped oldest entries");
        }
    }

    pub fn by_type<'a>(&'a self, event_type: &'a str) -> impl Iterator<Item = &'a MemoryEntry> + 'a {
        self.entries.iter().filter(move |e| e.event_type == event_type)
    }

    pub fn by_significance(&self, range: RangeInclusive<f64>) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter().filter(move |e| range.contains(&e.significance))
    }

    /// Entries created in `[from, to]`.
    pub fn between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> impl Iterator<Item = &MemoryEntry> {
        self.entries
            .iter()
            .filter(move |e| e.created_at >= from && e.created_at <= to)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
