//! Ordered, size-bounded memory store.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::archive::Archive;
use crate::entry::{MemoryEntry, MemoryId};
use crate::error::{MemoryError, Result};

/// Significance distance within which entries of another type still activate.
const ACTIVATION_SIGNIFICANCE_RADIUS: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStoreConfig {
    pub capacity: usize,
    pub archive_capacity: usize,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            archive_capacity: 10_000,
        }
    }
}

/// Archive-eligibility criteria. An entry matching any of them is selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveCriteria {
    /// Entries older than this many seconds. `None` disables the age check.
    pub max_age_secs: Option<u64>,
    pub min_weight: f64,
    pub min_significance: f64,
}

impl ArchiveCriteria {
    fn matches(&self, entry: &MemoryEntry, now: DateTime<Utc>) -> bool {
        let too_old = self.max_age_secs.is_some_and(|secs| {
            entry.age_at(now).num_seconds() > i64::try_from(secs).unwrap_or(i64::MAX)
        });
        too_old || entry.weight < self.min_weight || entry.significance < self.min_significance
    }
}

/// Parameters for one fused decay + archive pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenancePolicy {
    /// Base per-pass multiplier in `(0, 1]`.
    pub decay_factor: f64,
    /// Decay never takes a weight below this.
    pub weight_floor: f64,
    pub max_age_secs: Option<u64>,
    pub min_weight: f64,
    pub min_significance: f64,
}

impl Default for MaintenancePolicy {
    fn default() -> Self {
        Self {
            decay_factor: 0.98,
            weight_floor: 0.01,
            max_age_secs: None,
            min_weight: 0.1,
            min_significance: 0.05,
        }
    }
}

impl MaintenancePolicy {
    pub fn validate(&self) -> Result<()> {
        if !(self.decay_factor > 0.0 && self.decay_factor <= 1.0) {
            return Err(MemoryError::InvalidPolicy(format!(
                "decay_factor must be in (0, 1], got {}",
                self.decay_factor
            )));
        }
        for (name, value) in [
            ("weight_floor", self.weight_floor),
            ("min_weight", self.min_weight),
            ("min_significance", self.min_significance),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MemoryError::InvalidPolicy(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn criteria(&self) -> ArchiveCriteria {
        ArchiveCriteria {
            max_age_secs: self.max_age_secs,
            min_weight: self.min_weight,
            min_significance: self.min_significance,
        }
    }
}

/// Result of [`MemoryStore::batch_maintain`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub decayed: usize,
    pub archived: usize,
    pub remaining: usize,
}

/// Aggregates handed to the learning collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub entries: usize,
    pub capacity: usize,
    pub archived: usize,
    /// Entries hard-dropped by the append cap.
    pub dropped: u64,
    pub mean_significance: f64,
    pub mean_weight: f64,
    pub by_type: BTreeMap<String, usize>,
    pub mean_significance_by_type: BTreeMap<String, f64>,
    pub feedback_entries: usize,
}

/// Ordered memory. Insertion order is the only chronological contract.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: VecDeque<MemoryEntry>,
    capacity: usize,
    dropped: u64,
    archive: Archive,
}

impl MemoryStore {
    pub fn new(config: MemoryStoreConfig) -> Result<Self> {
        if config.capacity == 0 || config.archive_capacity == 0 {
            return Err(MemoryError::InvalidCapacity);
        }
        Ok(Self {
            entries: VecDeque::new(),
            capacity: config.capacity,
            dropped: 0,
            archive: Archive::new(config.archive_capacity),
        })
    }

    /// Insert at the tail. Over capacity, the oldest entries are dropped
    /// outright; they do not go to the archive.
    pub fn append(&mut self, entry: MemoryEntry) -> MemoryId {
        let id = entry.id;
        self.entries.push_back(entry);
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                self.dropped += 1;
                trace!(id = %evicted.id, "Dropped memory entry at capacity");
            }
        }
        id
    }

    /// Decay every weight. Returns the number of entries touched.
    pub fn decay(&mut self, decay_factor: f64, floor: f64) -> usize {
        for entry in self.entries.iter_mut() {
            decay_entry(entry, decay_factor, floor);
        }
        self.entries.len()
    }

    /// Ids of entries matching `criteria`, in store order.
    pub fn select_for_archive(&self, criteria: &ArchiveCriteria, now: DateTime<Utc>) -> Vec<MemoryId> {
        self.entries
            .iter()
            .filter(|e| criteria.matches(e, now))
            .map(|e| e.id)
            .collect()
    }

    /// Decay and archive selection in one traversal, then one bulk move of
    /// the selected entries into the archive.
    pub fn batch_maintain(
        &mut self,
        policy: &MaintenancePolicy,
        now: DateTime<Utc>,
    ) -> Result<MaintenanceReport> {
        policy.validate()?;
        let criteria = policy.criteria();

        let decayed = self.entries.len();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        let mut archived = Vec::new();
        for mut entry in self.entries.drain(..) {
            decay_entry(&mut entry, policy.decay_factor, policy.weight_floor);
            if criteria.matches(&entry, now) {
                archived.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;

        let report = MaintenanceReport {
            decayed,
            archived: archived.len(),
            remaining: self.entries.len(),
        };
        self.archive.extend(archived);

        debug!(
            decayed = report.decayed,
            archived = report.archived,
            remaining = report.remaining,
            "Memory maintenance complete"
        );
        Ok(report)
    }

    /// Entries related to an incoming event: same type, or significance
    /// within 0.2. Ranked by weight times recency, at most `limit`.
    pub fn activate(&self, event_type: &str, significance: f64, limit: usize) -> Vec<MemoryEntry> {
        let len = self.entries.len() as f64;
        let mut scored: Vec<(f64, &MemoryEntry)> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                e.event_type == event_type
                    || (e.significance - significance).abs() <= ACTIVATION_SIGNIFICANCE_RADIUS
            })
            .map(|(idx, e)| {
                let recency = (idx + 1) as f64 / len;
                (e.weight * recency, e)
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(limit).map(|(_, e)| e.clone()).collect()
    }

    pub fn stats(&self) -> MemoryStats {
        let mut stats = MemoryStats {
            entries: self.entries.len(),
            capacity: self.capacity,
            archived: self.archive.len(),
            dropped: self.dropped,
            ..Default::default()
        };
        if self.entries.is_empty() {
            return stats;
        }

        let mut significance_sums: BTreeMap<String, f64> = BTreeMap::new();
        let mut total_significance = 0.0;
        let mut total_weight = 0.0;
        for entry in &self.entries {
            total_significance += entry.significance;
            total_weight += entry.weight;
            *stats.by_type.entry(entry.event_type.clone()).or_insert(0) += 1;
            *significance_sums.entry(entry.event_type.clone()).or_insert(0.0) += entry.significance;
            if entry.feedback.is_some() {
                stats.feedback_entries += 1;
            }
        }

        let n = self.entries.len() as f64;
        stats.mean_significance = total_significance / n;
        stats.mean_weight = total_weight / n;
        stats.mean_significance_by_type = significance_sums
            .into_iter()
            .map(|(kind, sum)| {
                let count = stats.by_type.get(&kind).copied().unwrap_or(1) as f64;
                (kind, sum / count)
            })
            .collect();
        stats
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    pub fn get(&self, id: MemoryId) -> Option<&MemoryEntry> {
        self.entries.iter().find(|e| e.id == id)
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

    pub fn archive(&self) -> &Archive {
        &self.archive
    }
}

/// Higher-significance entries decay slower: the effective factor is
/// `decay_factor ^ (1 - significance / 2)`.
fn decay_entry(entry: &mut MemoryEntry, decay_factor: f64, floor: f64) {
    let factor = decay_factor.powf(1.0 - 0.5 * entry.significance);
    let decayed = entry.weight * factor;
    // Never raise a weight that already sits under the floor.
    entry.weight = if decayed < floor {
        floor.min(entry.weight)
    } else {
        decayed
    };
}
