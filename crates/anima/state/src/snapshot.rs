//! Plain-data projections of [`crate::LifeState`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::ParameterChange;
use crate::params::{AdaptationRecord, ParamTable};
use crate::state::{Identity, Vitals};
use crate::trend::{HistoryAggregate, TrendSummary};

/// Audit records per field summarised into a [`StatusView`].
pub const STATUS_TREND_WINDOW: usize = 50;

/// Bumped whenever the persisted shape of [`LifeSnapshot`] changes.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Complete, serialisable copy of a life state at one tick.
///
/// Contains no locks or callbacks. Restoring goes through
/// [`crate::LifeState::from_snapshot`], which re-validates every field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifeSnapshot {
    pub format_version: u32,
    pub tick: u64,
    pub taken_at: DateTime<Utc>,
    pub identity: Identity,
    pub alive: bool,
    pub vitals: Vitals,
    pub fatigue: f64,
    pub tension: f64,
    pub age: f64,
    pub subjective_time: f64,
    #[serde(default)]
    pub recent_events: Vec<String>,
    #[serde(default)]
    pub energy_history: Vec<f64>,
    #[serde(default)]
    pub stability_history: Vec<f64>,
    #[serde(default)]
    pub audit_log: Vec<ParameterChange>,
    pub learning: ParamTable,
    pub adaptation: ParamTable,
    #[serde(default)]
    pub adaptation_history: Vec<AdaptationRecord>,
}

/// Read-only status summary. Carries aggregates over the audit log and the
/// sample histories, never the raw entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusView {
    pub id: Uuid,
    pub born_at: DateTime<Utc>,
    pub alive: bool,
    pub tick: u64,
    pub vitals: Vitals,
    pub fatigue: f64,
    pub tension: f64,
    pub age: f64,
    pub subjective_time: f64,
    pub learning: ParamTable,
    pub adaptation: ParamTable,
    /// Number of adaptation records currently held.
    pub adaptations: usize,
    pub audit_entries: usize,
    pub recent_events: Vec<String>,
    /// Energy, integrity and stability over the last [`STATUS_TREND_WINDOW`] records each.
    pub vital_trends: Vec<TrendSummary>,
    /// Fatigue, tension and subjective time, same window.
    pub internal_dynamics: Vec<TrendSummary>,
    pub energy_history: HistoryAggregate,
    pub stability_history: HistoryAggregate,
}
