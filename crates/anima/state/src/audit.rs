//! Append-only, capped parameter-change audit log.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a parameter changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeReason {
    /// Bulk `apply_delta`.
    DeltaApplication,
    /// One of the direct single-field setters.
    DirectSet,
    /// Learning cadence nudged the learning table.
    Learning,
    /// Adaptation cadence nudged the adaptation table.
    Adaptation,
    /// Per-tick drift of the clocks, fatigue and tension.
    Drift,
}

impl std::fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeReason::DeltaApplication => write!(f, "delta-application"),
            ChangeReason::DirectSet => write!(f, "direct-set"),
            ChangeReason::Learning => write!(f, "learning"),
            ChangeReason::Adaptation => write!(f, "adaptation"),
            ChangeReason::Drift => write!(f, "drift"),
        }
    }
}

/// Free-form context attached to a change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeContext {
    /// The delta as requested, before clamping.
    pub raw_delta: Option<f64>,
    /// Whether the written value differs from the requested one.
    pub clamped: bool,
}

/// One audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChange {
    pub timestamp: DateTime<Utc>,
    pub tick: u64,
    pub parameter: String,
    pub old_value: f64,
    pub new_value: f64,
    pub reason: ChangeReason,
    pub context: ChangeContext,
}

impl ParameterChange {
    pub fn change(&self) -> f64 {
        self.new_value - self.old_value
    }
}

/// Audit log with the cap enforced at append time.
#[derive(Debug, Clone)]
pub struct AuditLog {
    entries: VecDeque<ParameterChange>,
    capacity: usize,
    dropped: u64,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            dropped: 0,
        }
    }

    /// Rebuild from persisted entries, keeping only the newest `capacity`.
    pub fn from_entries(entries: Vec<ParameterChange>, capacity: usize) -> Self {
        let mut log = Self::new(capacity);
        for entry in entries {
            log.push(entry);
        }
        log.dropped = 0;
        log
    }

    pub fn push(&mut self, change: ParameterChange) {
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(change);
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ParameterChange> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Records for a single parameter, oldest first.
    pub fn for_parameter<'a>(&'a self, parameter: &'a str) -> impl Iterator<Item = &'a ParameterChange> + 'a {
        self.entries.iter().filter(move |c| c.parameter == parameter)
    }

    /// The newest `n` records, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&ParameterChange> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
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

    /// Records evicted by the cap since construction.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn to_vec(&self) -> Vec<ParameterChange> {
        self.entries.iter().cloned().collect()
    }
}
