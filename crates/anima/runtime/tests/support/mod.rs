//! Test doubles for the runtime collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use anima_memory::{MemoryEntry, MemoryStats};
use anima_runtime::{
    ActionExecutor, AdaptationModel, CollaboratorError, Collaborators, DecisionModel, EventSource,
    FeedbackTracker, Interpretation, LearningModel, LifeConfig, MeaningModel,
};
use anima_state::{AdaptationRecord, Delta, ParamTable, SharedState, StatusView};
use anima_types::{Event, FeedbackRecord, ResponsePattern};
use parking_lot::Mutex;

/// Shared queue: tests push, the runtime drains.
#[derive(Clone, Default)]
pub struct Queue(pub Arc<Mutex<VecDeque<Event>>>);

impl Queue {
    pub fn push(&self, event: Event) {
        self.0.lock().push_back(event);
    }
}

impl EventSource for Queue {
    fn drain(&mut self, limit: usize) -> Vec<Event> {
        let mut queue = self.0.lock();
        let n = limit.min(queue.len());
        queue.drain(..n).collect()
    }
}

/// Significance is the event intensity; impact is the event payload.
/// Kind `"bad"` fails and kind `"boom"` panics.
pub struct PassthroughMeaning;

impl MeaningModel for PassthroughMeaning {
    fn interpret(&self, event: &Event, _state: &SharedState) -> Result<Interpretation, CollaboratorError> {
        match event.kind.as_str() {
            "bad" => Err(CollaboratorError::failed("cannot interpret")),
            "boom" => panic!("meaning table corrupted"),
            _ => Ok(Interpretation {
                significance: event.bounded_intensity(),
                impact: Delta::from_named(event.impact.iter().map(|(k, v)| (k.as_str(), *v))).delta,
            }),
        }
    }
}

pub struct AlwaysAbsorb;

impl DecisionModel for AlwaysAbsorb {
    fn decide(
        &self,
        _activated: &[MemoryEntry],
        _meaning: &Interpretation,
        _state: &SharedState,
    ) -> Result<ResponsePattern, CollaboratorError> {
        Ok(ResponsePattern::Absorb)
    }
}

pub struct ApplyImpact;

impl ActionExecutor for ApplyImpact {
    fn act(&mut self, pattern: ResponsePattern, impact: &Delta, state: &SharedState) -> Result<(), CollaboratorError> {
        if pattern != ResponsePattern::Ignore {
            state.apply_delta(impact);
        }
        Ok(())
    }
}

/// Reports each registration back on the next observation.
#[derive(Default)]
pub struct EchoFeedback {
    pending: Vec<(ResponsePattern, StatusView)>,
}

impl FeedbackTracker for EchoFeedback {
    fn register(&mut self, pattern: ResponsePattern, at: &StatusView) {
        self.pending.push((pattern, at.clone()));
    }

    fn observe(&mut self, now: &StatusView) -> Vec<FeedbackRecord> {
        self.pending
            .drain(..)
            .map(|(pattern, at)| FeedbackRecord {
                pattern,
                registered_tick: at.tick,
                observed_tick: now.tick,
                energy_change: now.vitals.energy - at.vitals.energy,
                integrity_change: now.vitals.integrity - at.vitals.integrity,
                stability_change: now.vitals.stability - at.vitals.stability,
            })
            .collect()
    }
}

/// Proposes every value `+step`, far beyond any sane cap.
pub struct GreedyLearning {
    pub step: f64,
    pub fail: bool,
}

impl LearningModel for GreedyLearning {
    fn learn(&self, _stats: &MemoryStats, current: &ParamTable) -> Result<ParamTable, CollaboratorError> {
        if self.fail {
            return Err(CollaboratorError::failed("learning offline"));
        }
        Ok(current.map_values(|_, v| v + self.step))
    }
}

pub struct GreedyAdaptation {
    pub step: f64,
}

impl AdaptationModel for GreedyAdaptation {
    fn adapt(
        &self,
        _history: &[AdaptationRecord],
        _learning: &ParamTable,
        current: &ParamTable,
    ) -> Result<ParamTable, CollaboratorError> {
        Ok(current.map_values(|_, v| v - self.step))
    }
}

pub fn collaborators(queue: &Queue) -> Collaborators {
    Collaborators {
        events: Box::new(queue.clone()),
        meaning: Box::new(PassthroughMeaning),
        decision: Box::new(AlwaysAbsorb),
        action: Box::new(ApplyImpact),
        feedback: Box::new(EchoFeedback::default()),
        learning: Box::new(GreedyLearning { step: 0.5, fail: false }),
        adaptation: Box::new(GreedyAdaptation { step: 0.5 }),
    }
}

/// Fast config: no sleeping, small periods.
pub fn config() -> LifeConfig {
    let mut config = LifeConfig::default();
    config.runtime.tick_interval_ms = 1;
    config.snapshot.period = 10;
    config.logs.flush_period = 10;
    config.cadence.learning_period = 5;
    config.cadence.adaptation_period = 20;
    config.cadence.maintenance_period = 10;
    config
}
