//! The tick loop.
//!
//! Each tick runs to completion on the loop thread:
//!
//! 1. drain pending events
//! 2. per event: meaning, memory activation, decision, action, memory append,
//!    feedback registration; then poll delayed feedback
//! 3. weakness penalty when any vital is at or below the threshold
//! 4. advance tick, age and subjective time
//! 5. log flush (`tick` phase), snapshot with `before-snapshot` /
//!    `after-snapshot` flushes around it
//! 6. learning cadence
//! 7. adaptation cadence
//! 8. memory maintenance cadence
//!
//! Every stage runs inside its own failure boundary: an error or panic is
//! logged, counted, triggers the `exception` flush phase, and the tick moves
//! on. Step 4 cannot fail, so the tick counter always advances.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anima_memory::{MaintenanceReport, MemoryEntry, MemoryStore};
use anima_state::{AdaptationRecord, LifeState, SharedState, TableKind};
use anima_types::{Event, ResponsePattern};
use chrono::Utc;
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace, warn};

use crate::cadence::Cadence;
use crate::collaborators::{Collaborators, Interpretation};
use crate::config::LifeConfig;
use crate::error::{panic_message, Result, RuntimeError};
use crate::logs::{FlushOutcome, FlushPhase, LogFlusher, LogManager, LogRecord};
use crate::snapshot::{SnapshotManager, SnapshotPersister, SnapshotStore};
use crate::telemetry::{self, RuntimeTelemetry};

/// Lifecycle of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopPhase {
    /// Built but not yet started.
    Idle,
    Running,
    /// Stop requested; the current tick and shutdown work are finishing.
    Stopping,
    Stopped,
}

/// Cloneable stop flag, checked once per tick boundary.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        let (flag, condvar) = &*self.inner;
        *flag.lock() = true;
        condvar.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for up to `timeout`, waking early on stop. Returns whether a
    /// stop was requested.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, condvar) = &*self.inner;
        let mut stopped = flag.lock();
        if !*stopped {
            condvar.wait_for(&mut stopped, timeout);
        }
        *stopped
    }
}

/// The contained failure boundaries inside one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStage {
    Drain,
    Event,
    Feedback,
    Weakness,
    Learning,
    Adaptation,
    Maintenance,
}

impl TickStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TickStage::Drain => "drain",
            TickStage::Event => "event",
            TickStage::Feedback => "feedback",
            TickStage::Weakness => "weakness",
            TickStage::Learning => "learning",
            TickStage::Adaptation => "adaptation",
            TickStage::Maintenance => "maintenance",
        }
    }
}

impl std::fmt::Display for TickStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub stage: TickStage,
    pub message: String,
}

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    /// Tick number after the advance.
    pub tick: u64,
    pub events_drained: usize,
    pub patterns: Vec<ResponsePattern>,
    pub feedback_observed: usize,
    pub weak: bool,
    pub flushed: bool,
    /// `None` when no snapshot was due.
    pub snapshot: Option<bool>,
    pub learning_changes: Option<usize>,
    pub adaptation_changes: Option<usize>,
    pub maintenance: Option<MaintenanceReport>,
    pub failures: Vec<StageFailure>,
}

impl TickReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub final_tick: u64,
    pub failed_stages: u64,
}

/// Per-tick working data. Never part of the state or its snapshots.
#[derive(Debug, Default)]
struct TickScratch {
    activated: Vec<MemoryEntry>,
    last_pattern: Option<ResponsePattern>,
    max_intensity: f64,
}

/// Assembles a [`LifeRuntime`].
pub struct RuntimeBuilder {
    config: LifeConfig,
    state: Option<LifeState>,
    collaborators: Option<Collaborators>,
    persister: Option<Box<dyn SnapshotPersister>>,
    flusher: Option<Box<dyn LogFlusher>>,
}

impl RuntimeBuilder {
    pub fn new(config: LifeConfig) -> Self {
        Self {
            config,
            state: None,
            collaborators: None,
            persister: None,
            flusher: None,
        }
    }

    /// Start from an existing state instead of a newborn one.
    pub fn state(mut self, state: LifeState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = Some(collaborators);
        self
    }

    pub fn persister(mut self, persister: impl SnapshotPersister + 'static) -> Self {
        self.persister = Some(Box::new(persister));
        self
    }

    pub fn flusher(mut self, flusher: impl LogFlusher + 'static) -> Self {
        self.flusher = Some(Box::new(flusher));
        self
    }

    pub fn build(self) -> Result<LifeRuntime> {
        self.config.validate()?;

        let collaborators = self
            .collaborators
            .ok_or(RuntimeError::MissingComponent("collaborators"))?;
        let persister = self
            .persister
            .ok_or(RuntimeError::MissingComponent("snapshot persister"))?;
        let flusher = self
            .flusher
            .ok_or(RuntimeError::MissingComponent("log flusher"))?;

        let config = self.config;
        let state = self
            .state
            .unwrap_or_else(|| LifeState::new(config.state.clone()));
        let memory = MemoryStore::new(config.memory.store_config())?;
        let snapshots = SnapshotManager::new(config.snapshot.period, persister);
        let logs = LogManager::new(config.logs.manager_config(), flusher)?;

        Ok(LifeRuntime {
            learning_cadence: Cadence::every(config.cadence.learning_period),
            adaptation_cadence: Cadence::every(config.cadence.adaptation_period),
            maintenance_cadence: Cadence::every(config.cadence.maintenance_period),
            config,
            state: SharedState::new(state),
            memory,
            collaborators,
            snapshots,
            logs,
            telemetry: Arc::new(RuntimeTelemetry::new()),
            phase: Arc::new(RwLock::new(LoopPhase::Idle)),
            scratch: TickScratch::default(),
        })
    }
}

/// Orchestrates one life: state, memory, collaborators and managers.
pub struct LifeRuntime {
    config: LifeConfig,
    state: SharedState,
    memory: MemoryStore,
    collaborators: Collaborators,
    snapshots: SnapshotManager,
    logs: LogManager,
    learning_cadence: Cadence,
    adaptation_cadence: Cadence,
    maintenance_cadence: Cadence,
    telemetry: Arc<RuntimeTelemetry>,
    phase: Arc<RwLock<LoopPhase>>,
    scratch: TickScratch,
}

impl LifeRuntime {
    pub fn builder(config: LifeConfig) -> RuntimeBuilder {
        RuntimeBuilder::new(config)
    }

    /// Build a runtime whose state comes from the newest snapshot in
    /// `store`, or a newborn state if the store is empty. The store then
    /// receives this runtime's snapshots.
    pub fn restore<S>(
        config: LifeConfig,
        collaborators: Collaborators,
        store: S,
        flusher: impl LogFlusher + 'static,
    ) -> Result<Self>
    where
        S: SnapshotStore + 'static,
    {
        let mut builder = RuntimeBuilder::new(config.clone());
        match store.load_latest()? {
            Some(snapshot) => {
                let tick = snapshot.tick;
                let state = LifeState::from_snapshot(snapshot, config.state.clone())?;
                info!(tick, id = %state.identity().id(), "Restoring life from snapshot");
                builder = builder.state(state);
            }
            None => info!("No snapshot found, starting a new life"),
        }
        builder
            .collaborators(collaborators)
            .persister(store)
            .flusher(flusher)
            .build()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    pub fn config(&self) -> &LifeConfig {
        &self.config
    }

    pub fn telemetry(&self) -> Arc<RuntimeTelemetry> {
        self.telemetry.clone()
    }

    pub fn phase(&self) -> LoopPhase {
        *self.phase.read()
    }

    pub fn snapshots(&self) -> &SnapshotManager {
        &self.snapshots
    }

    pub fn logs(&self) -> &LogManager {
        &self.logs
    }

    /// Response chosen for the last event processed.
    pub fn last_pattern(&self) -> Option<ResponsePattern> {
        self.scratch.last_pattern
    }

    /// Memories activated for the last event processed.
    pub fn last_activated(&self) -> &[MemoryEntry] {
        &self.scratch.activated
    }

    /// Buffer a runtime log record for the next flush.
    pub fn record(&mut self, record: LogRecord) {
        self.logs.record(record);
    }

    // ═══════════════════════════════════════════════════════════════════
    // TICK
    // ═══════════════════════════════════════════════════════════════════

    /// Execute one tick. Never fails; contained failures are listed in the
    /// report.
    pub fn tick(&mut self) -> TickReport {
        let mut report = TickReport::default();
        self.scratch = TickScratch::default();

        // 1. Drain
        let limit = self.config.runtime.max_events_per_tick.unwrap_or(usize::MAX);
        let events = self
            .contained(TickStage::Drain, &mut report, |rt| {
                Ok(rt.collaborators.events.drain(limit))
            })
            .unwrap_or_default();
        report.events_drained = events.len();

        // 2. Events, each in its own boundary
        for event in events {
            let kind = event.kind.clone();
            if let Some(pattern) =
                self.contained(TickStage::Event, &mut report, |rt| rt.process_event(&event))
            {
                report.patterns.push(pattern);
                self.telemetry.increment(telemetry::EVENTS_PROCESSED);
            } else {
                self.telemetry.increment(telemetry::EVENTS_FAILED);
                debug!(kind = %kind, "Event abandoned after failure");
            }
        }

        if let Some(observed) = self.contained(TickStage::Feedback, &mut report, |rt| rt.poll_feedback()) {
            report.feedback_observed = observed;
        }

        // 3. Weakness
        let dt = self.config.runtime.dt;
        report.weak = self
            .contained(TickStage::Weakness, &mut report, |rt| Ok(rt.apply_weakness(dt)))
            .unwrap_or(false);

        // 4. Advance
        let intensity = self.scratch.max_intensity;
        let tick = self.state.update(|s| s.advance_tick(dt, intensity));
        report.tick = tick;

        // 5. Logs and snapshot
        self.logs.record(
            LogRecord::new(tick, "tick", "tick complete")
                .with_field("events", report.events_drained as u64)
                .with_field("weak", report.weak),
        );
        report.flushed = self.flush(tick, FlushPhase::Tick);
        if self.snapshots.should_snapshot(tick) {
            self.flush(tick, FlushPhase::BeforeSnapshot);
            let ok = self.snapshots.maybe_snapshot(&self.state);
            if ok {
                self.telemetry.increment(telemetry::SNAPSHOTS);
                self.logs.record(LogRecord::new(tick, "snapshot", "snapshot persisted"));
                self.flush(tick, FlushPhase::AfterSnapshot);
            } else {
                self.telemetry.increment(telemetry::SNAPSHOT_FAILURES);
                self.logs.record(LogRecord::new(tick, "snapshot", "snapshot failed"));
            }
            report.snapshot = Some(ok);
        }

        // 6. Learning
        if self.learning_cadence.is_due(tick) {
            report.learning_changes =
                self.contained(TickStage::Learning, &mut report, |rt| rt.run_learning());
        }

        // 7. Adaptation
        if self.adaptation_cadence.is_due(tick) {
            report.adaptation_changes =
                self.contained(TickStage::Adaptation, &mut report, |rt| rt.run_adaptation());
        }

        // 8. Memory maintenance
        if self.maintenance_cadence.is_due(tick) {
            report.maintenance = self.contained(TickStage::Maintenance, &mut report, |rt| {
                let maintenance = rt
                    .memory
                    .batch_maintain(&rt.config.memory.maintenance, Utc::now())?;
                rt.telemetry.add(telemetry::MEMORY_ARCHIVED, maintenance.archived as u64);
                Ok(maintenance)
            });
        }

        self.telemetry.tick_completed(&self.state.vitals());
        trace!(
            tick,
            events = report.events_drained,
            weak = report.weak,
            failures = report.failures.len(),
            "Tick complete"
        );
        report
    }

    /// Run `f` inside a failure boundary. Errors and panics are logged,
    /// counted, recorded in `report`, and trigger the exception flush.
    fn contained<T>(
        &mut self,
        stage: TickStage,
        report: &mut TickReport,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Option<T> {
        let outcome = catch_unwind(AssertUnwindSafe(|| f(&mut *self)));
        let err = match outcome {
            Ok(Ok(value)) => return Some(value),
            Ok(Err(e)) => e,
            Err(payload) => RuntimeError::Panic {
                stage: stage.as_str(),
                message: panic_message(payload.as_ref()),
            },
        };

        let tick = self.state.tick();
        error!(tick, stage = %stage, error = %err, "Tick stage failed, continuing");
        self.telemetry.stage_failed(stage.as_str());
        self.logs.record(
            LogRecord::new(tick, "failure", err.to_string()).with_field("stage", stage.as_str()),
        );
        self.flush(tick, FlushPhase::Exception);
        report.failures.push(StageFailure {
            stage,
            message: err.to_string(),
        });
        None
    }

    fn flush(&mut self, tick: u64, phase: FlushPhase) -> bool {
        match self.logs.maybe_flush(tick, phase) {
            FlushOutcome::Flushed { .. } => {
                self.telemetry.increment(telemetry::FLUSHES);
                true
            }
            FlushOutcome::Failed => {
                self.telemetry.increment(telemetry::FLUSH_FAILURES);
                false
            }
            FlushOutcome::Skipped => false,
        }
    }

    fn process_event(&mut self, event: &Event) -> Result<ResponsePattern> {
        let collaborators = &mut self.collaborators;
        let state = &self.state;

        let meaning: Interpretation = collaborators
            .meaning
            .interpret(event, state)
            .map_err(RuntimeError::collaborator("meaning"))?;
        let significance = meaning.significance.clamp(0.0, 1.0);

        let activated = self.memory.activate(
            &event.kind,
            significance,
            self.config.memory.activation_limit,
        );

        let pattern = collaborators
            .decision
            .decide(&activated, &meaning, state)
            .map_err(RuntimeError::collaborator("decision"))?;

        collaborators
            .action
            .act(pattern, &meaning.impact, state)
            .map_err(RuntimeError::collaborator("action"))?;

        let subjective_time = state.update(|s| {
            s.record_event(&event.kind);
            s.subjective_time()
        });
        self.memory.append(
            MemoryEntry::new(event.kind.clone(), significance).with_subjective_time(subjective_time),
        );

        collaborators.feedback.register(pattern, &state.status());

        trace!(
            event = %event.id,
            kind = %event.kind,
            significance,
            activated = activated.len(),
            pattern = %pattern,
            "Processed event"
        );
        self.logs.record(
            LogRecord::new(state.tick(), "event", event.kind.clone())
                .with_field("pattern", pattern.as_str())
                .with_field("significance", significance),
        );

        self.scratch.activated = activated;
        self.scratch.last_pattern = Some(pattern);
        self.scratch.max_intensity = self.scratch.max_intensity.max(event.bounded_intensity());
        Ok(pattern)
    }

    fn poll_feedback(&mut self) -> Result<usize> {
        let status = self.state.status();
        let records = self.collaborators.feedback.observe(&status);
        let count = records.len();
        for record in records {
            self.memory.append(
                MemoryEntry::from_feedback(record).with_subjective_time(status.subjective_time),
            );
        }
        Ok(count)
    }

    fn apply_weakness(&mut self, dt: f64) -> bool {
        let policy = &self.config.weakness;
        if !policy.is_weak(&self.state.vitals()) {
            return false;
        }
        let penalty = policy.penalty(dt);
        self.state.apply_delta(&penalty);
        self.telemetry.increment(telemetry::WEAK_TICKS);
        trace!(tick = self.state.tick(), "Weakness penalty applied");
        true
    }

    fn run_learning(&mut self) -> Result<usize> {
        let stats = self.memory.stats();
        let current = self.state.read(|s| s.learning().clone());
        let proposed = self
            .collaborators
            .learning
            .learn(&stats, &current)
            .map_err(RuntimeError::collaborator("learning"))?;

        let max_delta = self.config.cadence.max_param_delta;
        let applied = self
            .state
            .update(|s| s.apply_table_update(TableKind::Learning, &proposed, max_delta));
        debug!(tick = self.state.tick(), changes = applied.len(), "Learning pass applied");
        Ok(applied.len())
    }

    fn run_adaptation(&mut self) -> Result<usize> {
        let (history, learning, current) = self.state.read(|s| {
            let history: Vec<AdaptationRecord> = s.adaptation_history().cloned().collect();
            (history, s.learning().clone(), s.adaptation().clone())
        });
        let proposed = self
            .collaborators
            .adaptation
            .adapt(&history, &learning, &current)
            .map_err(RuntimeError::collaborator("adaptation"))?;

        let max_delta = self.config.cadence.max_param_delta;
        let changes = self.state.update(|s| {
            let before = s.adaptation().clone();
            let applied = s.apply_table_update(TableKind::Adaptation, &proposed, max_delta);
            s.record_adaptation(before);
            applied.len()
        });
        debug!(tick = self.state.tick(), changes, "Adaptation pass applied");
        Ok(changes)
    }

    // ═══════════════════════════════════════════════════════════════════
    // LOOP
    // ═══════════════════════════════════════════════════════════════════

    /// Run `n` ticks back to back without sleeping.
    pub fn run_ticks(&mut self, n: u64) -> RunSummary {
        let mut summary = RunSummary::default();
        for _ in 0..n {
            let report = self.tick();
            summary.ticks += 1;
            summary.final_tick = report.tick;
            summary.failed_stages += report.failures.len() as u64;
        }
        summary
    }

    /// Tick until `stop` is signalled or `runtime.max_ticks` is reached,
    /// sleeping `tick_interval_ms` between ticks. Then shut down.
    pub fn run(&mut self, stop: &StopSignal) -> RunSummary {
        let interval = Duration::from_millis(self.config.runtime.tick_interval_ms);
        let max_ticks = self.config.runtime.max_ticks;
        *self.phase.write() = LoopPhase::Running;
        info!(
            id = %self.state.read(|s| s.identity().id()),
            tick = self.state.tick(),
            interval_ms = interval.as_millis() as u64,
            "Life runtime started"
        );

        let mut summary = RunSummary::default();
        while !stop.is_stopped() {
            let report = self.tick();
            summary.ticks += 1;
            summary.final_tick = report.tick;
            summary.failed_stages += report.failures.len() as u64;

            if max_ticks.is_some_and(|max| report.tick >= max) {
                info!(tick = report.tick, "Reached configured tick limit");
                break;
            }
            if stop.wait_timeout(interval) {
                break;
            }
        }

        *self.phase.write() = LoopPhase::Stopping;
        self.shutdown();
        *self.phase.write() = LoopPhase::Stopped;
        info!(
            ticks = summary.ticks,
            final_tick = summary.final_tick,
            failed_stages = summary.failed_stages,
            "Life runtime stopped"
        );
        summary
    }

    /// Final snapshot (when snapshots are enabled), then the unconditional
    /// shutdown flush.
    pub fn shutdown(&mut self) {
        let tick = self.state.tick();
        if self.snapshots.is_enabled() && self.snapshots.last_snapshot_tick() != Some(tick) {
            if self.snapshots.snapshot_now(&self.state) {
                self.telemetry.increment(telemetry::SNAPSHOTS);
            } else {
                self.telemetry.increment(telemetry::SNAPSHOT_FAILURES);
            }
        }
        self.logs
            .record(LogRecord::new(tick, "lifecycle", "runtime shutting down"));
        if !self.flush(tick, FlushPhase::Shutdown) {
            warn!(tick, pending = self.logs.pending(), "Shutdown flush failed, records lost");
        }
    }

    /// Move the loop onto a dedicated thread.
    pub fn spawn(self) -> Result<RuntimeHandle> {
        let stop = StopSignal::new();
        let state = self.state.clone();
        let phase = self.phase.clone();
        let telemetry = self.telemetry.clone();
        *phase.write() = LoopPhase::Running;

        let signal = stop.clone();
        let thread = std::thread::Builder::new()
            .name("anima-loop".to_string())
            .spawn(move || {
                let mut runtime = self;
                runtime.run(&signal);
                runtime
            })
            .map_err(RuntimeError::Spawn)?;

        Ok(RuntimeHandle {
            stop,
            state,
            phase,
            telemetry,
            thread,
        })
    }
}

impl std::fmt::Debug for LifeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifeRuntime")
            .field("state", &self.state)
            .field("memory", &self.memory.len())
            .field("phase", &self.phase())
            .field("snapshots", &self.snapshots)
            .field("logs", &self.logs)
            .finish()
    }
}

/// Control surface for a spawned loop. Status reads go through the shared
/// state while the loop keeps writing.
pub struct RuntimeHandle {
    stop: StopSignal,
    state: SharedState,
    phase: Arc<RwLock<LoopPhase>>,
    telemetry: Arc<RuntimeTelemetry>,
    thread: JoinHandle<LifeRuntime>,
}

impl RuntimeHandle {
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn phase(&self) -> LoopPhase {
        *self.phase.read()
    }

    pub fn telemetry(&self) -> &RuntimeTelemetry {
        &self.telemetry
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Request a stop at the next tick boundary.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the loop thread and take the runtime back.
    pub fn join(self) -> Result<LifeRuntime> {
        self.thread.join().map_err(|payload| RuntimeError::Panic {
            stage: "loop",
            message: panic_message(payload.as_ref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_signal_wakes_waiter() {
        let stop = StopSignal::new();
        let remote = stop.clone();
        let waiter = std::thread::spawn(move || remote.wait_timeout(Duration::from_secs(30)));
        std::thread::sleep(Duration::from_millis(20));
        stop.stop();
        assert!(waiter.join().unwrap());
        assert!(stop.is_stopped());
    }

    #[test]
    fn test_wait_timeout_without_stop() {
        let stop = StopSignal::new();
        assert!(!stop.wait_timeout(Duration::from_millis(5)));
    }

    #[test]
    fn test_builder_requires_components() {
        let err = RuntimeBuilder::new(LifeConfig::default()).build().unwrap_err();
        assert!(matches!(err, RuntimeError::MissingComponent("collaborators")));
    }

    #[test]
    fn test_builder_validates_config() {
        let mut config = LifeConfig::default();
        config.cadence.adaptation_period = 1;
        let err = RuntimeBuilder::new(config).build().unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidConfig(_)));
    }
}
