//! Interfaces of the injected policy collaborators.
//!
//! The runtime only orchestrates. Interpretation, decision, action, feedback,
//! learning and adaptation are supplied from outside; `anima-policies`
//! provides table-driven baselines.

use anima_memory::{MemoryEntry, MemoryStats};
use anima_state::{AdaptationRecord, Delta, ParamTable, SharedState, StatusView};
use anima_types::{Event, FeedbackRecord, ResponsePattern};

use crate::error::CollaboratorError;

/// What an event means for this life.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Interpretation {
    /// In `[0, 1]`.
    pub significance: f64,
    pub impact: Delta,
}

/// Non-blocking source of pending events.
pub trait EventSource: Send {
    /// Take up to `limit` queued events. An empty queue yields an empty vec.
    fn drain(&mut self, limit: usize) -> Vec<Event>;
}

pub trait MeaningModel: Send {
    fn interpret(&self, event: &Event, state: &SharedState) -> Result<Interpretation, CollaboratorError>;
}

pub trait DecisionModel: Send {
    fn decide(
        &self,
        activated: &[MemoryEntry],
        meaning: &Interpretation,
        state: &SharedState,
    ) -> Result<ResponsePattern, CollaboratorError>;
}

/// Applies the chosen response. Must mutate state only through its
/// validated accessors.
pub trait ActionExecutor: Send {
    fn act(
        &mut self,
        pattern: ResponsePattern,
        impact: &Delta,
        state: &SharedState,
    ) -> Result<(), CollaboratorError>;
}

/// Tracks responses and reports their consequences some ticks later.
pub trait FeedbackTracker: Send {
    fn register(&mut self, pattern: ResponsePattern, at: &StatusView);

    /// Records whose delay has elapsed as of `now`.
    fn observe(&mut self, now: &StatusView) -> Vec<FeedbackRecord>;
}

/// Proposes a new learning table. The runtime caps every per-key step.
pub trait LearningModel: Send {
    fn learn(&self, stats: &MemoryStats, current: &ParamTable) -> Result<ParamTable, CollaboratorError>;
}

/// Proposes a new adaptation table. The runtime caps every per-key step.
pub trait AdaptationModel: Send {
    fn adapt(
        &self,
        history: &[AdaptationRecord],
        learning: &ParamTable,
        current: &ParamTable,
    ) -> Result<ParamTable, CollaboratorError>;
}

/// The full set of collaborators one runtime drives.
pub struct Collaborators {
    pub events: Box<dyn EventSource>,
    pub meaning: Box<dyn MeaningModel>,
    pub decision: Box<dyn DecisionModel>,
    pub action: Box<dyn ActionExecutor>,
    pub feedback: Box<dyn FeedbackTracker>,
    pub learning: Box<dyn LearningModel>,
    pub adaptation: Box<dyn AdaptationModel>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
