//! The validated life state.
//!
//! [`LifeState`] is plain data: it owns no lock and no callbacks, so it can
//! be projected into a [`LifeSnapshot`] field by field. Concurrent access goes
//! through [`crate::SharedState`].

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::audit::{AuditLog, ChangeContext, ChangeReason, ParameterChange};
use crate::error::{Result, StateError};
use crate::field::{Delta, FieldLookup, StateField};
use crate::params::{AdaptationRecord, AppliedChange, ParamTable, TableKind};
use crate::snapshot::{LifeSnapshot, StatusView, SNAPSHOT_FORMAT_VERSION, STATUS_TREND_WINDOW};
use crate::trend::{summarize, HistoryAggregate, TrendSummary};

/// Fatigue gained per unit of `dt`, scaled up by event intensity.
const FATIGUE_RATE: f64 = 0.001;
/// Fraction of tension released per unit of `dt`.
const TENSION_RELAXATION: f64 = 0.05;

/// Bounds for the capped collections inside [`LifeState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Maximum audit records kept (oldest dropped first).
    pub audit_capacity: usize,
    /// Maximum energy/stability history samples.
    pub history_capacity: usize,
    /// Maximum entries in the recent-events window.
    pub recent_events_capacity: usize,
    /// Maximum adaptation records kept.
    pub adaptation_history_capacity: usize,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            audit_capacity: 1000,
            history_capacity: 256,
            recent_events_capacity: 32,
            adaptation_history_capacity: 64,
        }
    }
}

/// Identity fixed at birth. There are no setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: uuid::Uuid,
    born_at: DateTime<Utc>,
}

impl Identity {
    pub fn generate() -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            born_at: Utc::now(),
        }
    }

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn born_at(&self) -> DateTime<Utc> {
        self.born_at
    }
}

/// The three core health fields.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub energy: f64,
    pub integrity: f64,
    pub stability: f64,
}

/// Outcome of one bulk delta application.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaReport {
    pub applied: usize,
    pub clamped: usize,
    /// Non-finite components that were not written.
    pub skipped: usize,
}

/// Mutable record of one life.
#[derive(Debug, Clone)]
pub struct LifeState {
    identity: Identity,

    energy: f64,
    integrity: f64,
    stability: f64,
    fatigue: f64,
    tension: f64,
    age: f64,
    subjective_time: f64,

    tick: u64,
    alive: bool,

    recent_events: VecDeque<String>,
    energy_history: VecDeque<f64>,
    stability_history: VecDeque<f64>,
    audit: AuditLog,

    learning: ParamTable,
    adaptation: ParamTable,
    adaptation_history: VecDeque<AdaptationRecord>,

    config: StateConfig,
}

impl LifeState {
    /// A newborn state: full vitals, zero counters, default policy tables.
    pub fn new(config: StateConfig) -> Self {
        Self {
            identity: Identity::generate(),
            energy: 100.0,
            integrity: 1.0,
            stability: 1.0,
            fatigue: 0.0,
            tension: 0.0,
            age: 0.0,
            subjective_time: 0.0,
            tick: 0,
            alive: true,
            recent_events: VecDeque::new(),
            energy_history: VecDeque::new(),
            stability_history: VecDeque::new(),
            audit: AuditLog::new(config.audit_capacity),
            learning: ParamTable::learning_defaults(),
            adaptation: ParamTable::adaptation_defaults(),
            adaptation_history: VecDeque::new(),
            config,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // READ ACCESS
    // ═══════════════════════════════════════════════════════════════════

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn get(&self, field: StateField) -> f64 {
        match field {
            StateField::Energy => self.energy,
            StateField::Integrity => self.integrity,
            StateField::Stability => self.stability,
            StateField::Fatigue => self.fatigue,
            StateField::Tension => self.tension,
            StateField::Age => self.age,
            StateField::SubjectiveTime => self.subjective_time,
        }
    }

    pub fn vitals(&self) -> Vitals {
        Vitals {
            energy: self.energy,
            integrity: self.integrity,
            stability: self.stability,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn subjective_time(&self) -> f64 {
        self.subjective_time
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn recent_events(&self) -> impl Iterator<Item = &str> {
        self.recent_events.iter().map(String::as_str)
    }

    pub fn energy_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.energy_history.iter().copied()
    }

    pub fn stability_history(&self) -> impl Iterator<Item = f64> + '_ {
        self.stability_history.iter().copied()
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn learning(&self) -> &ParamTable {
        &self.learning
    }

    pub fn adaptation(&self) -> &ParamTable {
        &self.adaptation
    }

    pub fn table(&self, kind: TableKind) -> &ParamTable {
        match kind {
            TableKind::Learning => &self.learning,
            TableKind::Adaptation => &self.adaptation,
        }
    }

    pub fn adaptation_history(&self) -> impl ExactSizeIterator<Item = &AdaptationRecord> {
        self.adaptation_history.iter()
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    // ═══════════════════════════════════════════════════════════════════
    // VALIDATED MUTATION
    // ═══════════════════════════════════════════════════════════════════

    /// Apply a set of additive changes. Never fails.
    ///
    /// Each component is clamped into its field's range and audited as
    /// `delta-application`. Non-finite components are skipped.
    pub fn apply_delta(&mut self, delta: &Delta) -> DeltaReport {
        let mut report = DeltaReport::default();
        for (field, change) in delta.iter() {
            if !change.is_finite() {
                warn!(field = %field, delta = change, "Skipping non-finite delta");
                report.skipped += 1;
                continue;
            }
            let target = self.get(field) + change;
            let clamped = self.write(field, target, ChangeReason::DeltaApplication, Some(change));
            report.applied += 1;
            if clamped {
                report.clamped += 1;
            }
        }
        trace!(
            tick = self.tick,
            applied = report.applied,
            clamped = report.clamped,
            "Applied delta"
        );
        report
    }

    /// Set one field directly. Out-of-range values are clamped and audited;
    /// non-finite values are rejected.
    pub fn set_field(&mut self, field: StateField, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(StateError::NonFinite {
                field: field.name().to_string(),
                value,
            });
        }
        self.write(field, value, ChangeReason::DirectSet, None);
        Ok(self.get(field))
    }

    /// Set a field by name. Identity names are rejected as immutable.
    pub fn set_named(&mut self, name: &str, value: f64) -> Result<f64> {
        match StateField::lookup(name) {
            FieldLookup::Mutable(field) => self.set_field(field, value),
            FieldLookup::Immutable => Err(StateError::ImmutableField(name.to_string())),
            FieldLookup::Unknown => Err(StateError::UnknownField(name.to_string())),
        }
    }

    pub fn set_energy(&mut self, value: f64) -> Result<f64> {
        self.set_field(StateField::Energy, value)
    }

    pub fn set_integrity(&mut self, value: f64) -> Result<f64> {
        self.set_field(StateField::Integrity, value)
    }

    pub fn set_stability(&mut self, value: f64) -> Result<f64> {
        self.set_field(StateField::Stability, value)
    }

    /// Liveness never goes false: low vitals degrade, they do not kill.
    /// A `false` write is logged and ignored.
    pub fn set_alive(&mut self, alive: bool) {
        if !alive {
            warn!(tick = self.tick, "Ignoring request to clear liveness flag");
            return;
        }
        self.alive = true;
    }

    fn slot(&mut self, field: StateField) -> &mut f64 {
        match field {
            StateField::Energy => &mut self.energy,
            StateField::Integrity => &mut self.integrity,
            StateField::Stability => &mut self.stability,
            StateField::Fatigue => &mut self.fatigue,
            StateField::Tension => &mut self.tension,
            StateField::Age => &mut self.age,
            StateField::SubjectiveTime => &mut self.subjective_time,
        }
    }

    /// Clamp, write and audit. Returns whether clamping occurred.
    fn write(
        &mut self,
        field: StateField,
        target: f64,
        reason: ChangeReason,
        raw_delta: Option<f64>,
    ) -> bool {
        let value = field.range().clamp(target);
        let clamped = value != target;
        let slot = self.slot(field);
        let old_value = *slot;
        *slot = value;

        self.audit.push(ParameterChange {
            timestamp: Utc::now(),
            tick: self.tick,
            parameter: field.name().to_string(),
            old_value,
            new_value: value,
            reason,
            context: ChangeContext { raw_delta, clamped },
        });
        clamped
    }

    /// Write a drifted value, auditing only when it actually moved.
    fn drift(&mut self, field: StateField, target: f64) {
        let value = field.range().clamp(target);
        let slot = self.slot(field);
        let old_value = *slot;
        if value == old_value {
            return;
        }
        *slot = value;

        self.audit.push(ParameterChange {
            timestamp: Utc::now(),
            tick: self.tick,
            parameter: field.name().to_string(),
            old_value,
            new_value: value,
            reason: ChangeReason::Drift,
            context: ChangeContext {
                raw_delta: Some(target - old_value),
                clamped: value != target,
            },
        });
    }

    // ═══════════════════════════════════════════════════════════════════
    // COUNTERS AND BOUNDED HISTORY
    // ═══════════════════════════════════════════════════════════════════

    /// Advance the tick counter, the two clocks and the slow drift of
    /// fatigue and tension. Each field that moves gets a `drift` record.
    ///
    /// Subjective time runs faster under intense events and when stable:
    /// `dt * (1 + intensity) * (0.5 + stability)`.
    pub fn advance_tick(&mut self, dt: f64, intensity: f64) -> u64 {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let intensity = if intensity.is_finite() {
            intensity.clamp(0.0, 1.0)
        } else {
            0.0
        };

        self.tick += 1;
        self.drift(StateField::Age, self.age + dt);
        self.drift(
            StateField::SubjectiveTime,
            self.subjective_time + dt * (1.0 + intensity) * (0.5 + self.stability),
        );
        self.drift(
            StateField::Fatigue,
            self.fatigue + FATIGUE_RATE * dt * (1.0 + intensity),
        );
        self.drift(
            StateField::Tension,
            self.tension * (1.0 - (TENSION_RELAXATION * dt).min(1.0)),
        );

        let cap = self.config.history_capacity.max(1);
        push_capped(&mut self.energy_history, self.energy, cap);
        push_capped(&mut self.stability_history, self.stability, cap);

        self.tick
    }

    /// Remember an event type in the recent-events window.
    pub fn record_event(&mut self, kind: &str) {
        let cap = self.config.recent_events_capacity.max(1);
        push_capped(&mut self.recent_events, kind.to_string(), cap);
    }

    /// Move a policy table toward `proposed`, at most `max_delta` per key.
    ///
    /// Keys outside the table's fixed shape are ignored. Every change is
    /// audited under the table's prefix.
    pub fn apply_table_update(
        &mut self,
        kind: TableKind,
        proposed: &ParamTable,
        max_delta: f64,
    ) -> Vec<AppliedChange> {
        let max_delta = if max_delta.is_finite() { max_delta.abs() } else { 0.0 };
        let reason = match kind {
            TableKind::Learning => ChangeReason::Learning,
            TableKind::Adaptation => ChangeReason::Adaptation,
        };

        let mut applied = Vec::new();
        for (key, target) in proposed.iter() {
            let Some(current) = self.table(kind).get(key) else {
                debug!(table = kind.prefix(), key, "Ignoring update for unknown parameter");
                continue;
            };
            if !target.is_finite() {
                continue;
            }
            let requested = target - current;
            let step = requested.clamp(-max_delta, max_delta);
            let new_value = (current + step).clamp(0.0, 1.0);
            if new_value == current {
                continue;
            }
            let clamped = new_value != target;

            let table = match kind {
                TableKind::Learning => &mut self.learning,
                TableKind::Adaptation => &mut self.adaptation,
            };
            table.set(key, new_value);

            self.audit.push(ParameterChange {
                timestamp: Utc::now(),
                tick: self.tick,
                parameter: format!("{}.{}", kind.prefix(), key),
                old_value: current,
                new_value,
                reason,
                context: ChangeContext {
                    raw_delta: Some(requested),
                    clamped,
                },
            });
            applied.push(AppliedChange {
                key: key.to_string(),
                old_value: current,
                new_value,
                clamped,
            });
        }
        applied
    }

    /// Append an adaptation record with the current adaptation table as `after`.
    pub fn record_adaptation(&mut self, before: ParamTable) {
        let cap = self.config.adaptation_history_capacity.max(1);
        let record = AdaptationRecord {
            tick: self.tick,
            timestamp: Utc::now(),
            before,
            after: self.adaptation.clone(),
        };
        push_capped(&mut self.adaptation_history, record, cap);
    }

    // ═══════════════════════════════════════════════════════════════════
    // TRENDS
    // ═══════════════════════════════════════════════════════════════════

    pub fn trend(&self, field: StateField, window: usize) -> TrendSummary {
        summarize(field, self.audit.iter(), window)
    }

    /// Trends for energy, integrity and stability.
    pub fn vital_trends(&self, window: usize) -> Vec<TrendSummary> {
        StateField::VITALS
            .iter()
            .map(|field| self.trend(*field, window))
            .collect()
    }

    /// Trends for the slower internal dynamics.
    pub fn internal_dynamics_trends(&self, window: usize) -> Vec<TrendSummary> {
        [StateField::Fatigue, StateField::Tension, StateField::SubjectiveTime]
            .iter()
            .map(|field| self.trend(*field, window))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════
    // PROJECTIONS
    // ═══════════════════════════════════════════════════════════════════

    /// Plain-data copy of every persistable field.
    pub fn to_snapshot(&self) -> LifeSnapshot {
        LifeSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            tick: self.tick,
            taken_at: Utc::now(),
            identity: self.identity,
            alive: self.alive,
            vitals: self.vitals(),
            fatigue: self.fatigue,
            tension: self.tension,
            age: self.age,
            subjective_time: self.subjective_time,
            recent_events: self.recent_events.iter().cloned().collect(),
            energy_history: self.energy_history.iter().copied().collect(),
            stability_history: self.stability_history.iter().copied().collect(),
            audit_log: self.audit.to_vec(),
            learning: self.learning.clone(),
            adaptation: self.adaptation.clone(),
            adaptation_history: self.adaptation_history.iter().cloned().collect(),
        }
    }

    /// Rebuild a state from a snapshot, re-validating every field.
    pub fn from_snapshot(snapshot: LifeSnapshot, config: StateConfig) -> Result<Self> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(StateError::UnsupportedSnapshot {
                found: snapshot.format_version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }

        let restore = |field: StateField, value: f64| -> Result<f64> {
            if value.is_finite() {
                Ok(field.range().clamp(value))
            } else {
                Err(StateError::NonFinite {
                    field: field.name().to_string(),
                    value,
                })
            }
        };

        let history_cap = config.history_capacity.max(1);
        let state = Self {
            identity: snapshot.identity,
            energy: restore(StateField::Energy, snapshot.vitals.energy)?,
            integrity: restore(StateField::Integrity, snapshot.vitals.integrity)?,
            stability: restore(StateField::Stability, snapshot.vitals.stability)?,
            fatigue: restore(StateField::Fatigue, snapshot.fatigue)?,
            tension: restore(StateField::Tension, snapshot.tension)?,
            age: restore(StateField::Age, snapshot.age)?,
            subjective_time: restore(StateField::SubjectiveTime, snapshot.subjective_time)?,
            tick: snapshot.tick,
            alive: true,
            recent_events: tail(snapshot.recent_events, config.recent_events_capacity.max(1)),
            energy_history: tail(snapshot.energy_history, history_cap),
            stability_history: tail(snapshot.stability_history, history_cap),
            audit: AuditLog::from_entries(snapshot.audit_log, config.audit_capacity),
            learning: snapshot.learning,
            adaptation: snapshot.adaptation,
            adaptation_history: tail(
                snapshot.adaptation_history,
                config.adaptation_history_capacity.max(1),
            ),
            config,
        };
        debug!(tick = state.tick, id = %state.identity.id, "Restored state from snapshot");
        Ok(state)
    }

    /// Read-only status projection for external callers.
    pub fn status(&self) -> StatusView {
        StatusView {
            id: self.identity.id,
            born_at: self.identity.born_at,
            alive: self.alive,
            tick: self.tick,
            vitals: self.vitals(),
            fatigue: self.fatigue,
            tension: self.tension,
            age: self.age,
            subjective_time: self.subjective_time,
            learning: self.learning.clone(),
            adaptation: self.adaptation.clone(),
            adaptations: self.adaptation_history.len(),
            audit_entries: self.audit.len(),
            recent_events: self.recent_events.iter().cloned().collect(),
            vital_trends: self.vital_trends(STATUS_TREND_WINDOW),
            internal_dynamics: self.internal_dynamics_trends(STATUS_TREND_WINDOW),
            energy_history: HistoryAggregate::from_samples(self.energy_history()),
            stability_history: HistoryAggregate::from_samples(self.stability_history()),
        }
    }
}

impl Default for LifeState {
    fn default() -> Self {
        Self::new(StateConfig::default())
    }
}

fn push_capped<T>(buffer: &mut VecDeque<T>, value: T, cap: usize) {
    while buffer.len() >= cap {
        buffer.pop_front();
    }
    buffer.push_back(value);
}

fn tail<T>(items: Vec<T>, cap: usize) -> VecDeque<T> {
    let skip = items.len().saturating_sub(cap);
    items.into_iter().skip(skip).collect()
}
