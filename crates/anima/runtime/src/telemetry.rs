//! Runtime counters.
//!
//! Every event is reported twice: to the `metrics` facade (a no-op until the
//! host installs a recorder) and to an in-process counter map that status
//! queries and tests can read.

use std::collections::BTreeMap;

use anima_state::Vitals;
use parking_lot::RwLock;

pub const TICKS: &str = "anima_ticks_total";
pub const EVENTS_PROCESSED: &str = "anima_events_processed_total";
pub const EVENTS_FAILED: &str = "anima_events_failed_total";
pub const STAGE_FAILURES: &str = "anima_stage_failures_total";
pub const WEAK_TICKS: &str = "anima_weak_ticks_total";
pub const SNAPSHOTS: &str = "anima_snapshots_total";
pub const SNAPSHOT_FAILURES: &str = "anima_snapshot_failures_total";
pub const FLUSHES: &str = "anima_log_flushes_total";
pub const FLUSH_FAILURES: &str = "anima_log_flush_failures_total";
pub const MEMORY_ARCHIVED: &str = "anima_memory_archived_total";

#[derive(Debug, Default)]
pub struct RuntimeTelemetry {
    counters: RwLock<BTreeMap<&'static str, u64>>,
}

impl RuntimeTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, name: &'static str) {
        self.add(name, 1);
    }

    pub fn add(&self, name: &'static str, value: u64) {
        metrics::counter!(name, value);
        *self.counters.write().entry(name).or_insert(0) += value;
    }

    /// A contained failure in one tick stage.
    pub fn stage_failed(&self, stage: &'static str) {
        metrics::increment_counter!(STAGE_FAILURES, "stage" => stage);
        *self.counters.write().entry(STAGE_FAILURES).or_insert(0) += 1;
    }

    pub fn tick_completed(&self, vitals: &Vitals) {
        self.increment(TICKS);
        metrics::gauge!("anima_energy", vitals.energy);
        metrics::gauge!("anima_integrity", vitals.integrity);
        metrics::gauge!("anima_stability", vitals.stability);
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.read().get(name).copied().unwrap_or(0)
    }

    pub fn counters(&self) -> BTreeMap<String, u64> {
        self.counters
            .read()
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect()
    }
}
