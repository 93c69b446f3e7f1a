//! Anima runtime
//!
//! The tick loop that drives one life, plus the pieces it schedules:
//!
//! - [`WeaknessPolicy`]: pure degradation penalties for low vitals
//! - [`SnapshotManager`]: periodic, failure-isolated state persistence
//! - [`LogManager`]: buffered runtime log flushed at defined phases
//! - [`Cadence`]: the tick-modulo predicate every periodic subsystem shares
//! - [`LifeRuntime`]: the orchestrator, with one failure boundary per stage
//!
//! Interpretation and policy live behind the traits in [`collaborators`].
//!
//! ```no_run
//! use anima_runtime::{LifeConfig, LifeRuntime, StopSignal};
//! # fn collaborators() -> anima_runtime::Collaborators { unimplemented!() }
//!
//! let runtime = LifeRuntime::builder(LifeConfig::default())
//!     .collaborators(collaborators())
//!     .persister(anima_runtime::storage::InMemorySnapshotStore::default())
//!     .flusher(anima_runtime::storage::MemoryLogSink::new())
//!     .build()?;
//! let handle = runtime.spawn()?;
//! handle.stop();
//! let _runtime = handle.join()?;
//! # Ok::<(), anima_runtime::RuntimeError>(())
//! ```

#![deny(unsafe_code)]

pub mod cadence;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod logs;
pub mod runtime;
pub mod snapshot;
pub mod storage;
pub mod telemetry;
pub mod weakness;

pub use cadence::Cadence;
pub use collaborators::{
    ActionExecutor, AdaptationModel, Collaborators, DecisionModel, EventSource, FeedbackTracker,
    Interpretation, LearningModel, MeaningModel,
};
pub use config::{CadenceSettings, LifeConfig, LogSettings, MemorySettings, RuntimeSettings, SnapshotSettings};
pub use error::{CollaboratorError, FlushError, PersistError, Result, RuntimeError};
pub use logs::{FlushOutcome, FlushPhase, LogBuffer, LogFlusher, LogManager, LogManagerConfig, LogRecord};
pub use runtime::{
    LifeRuntime, LoopPhase, RunSummary, RuntimeBuilder, RuntimeHandle, StageFailure, StopSignal,
    TickReport, TickStage,
};
pub use snapshot::{SnapshotManager, SnapshotPersister, SnapshotStore};
pub use telemetry::RuntimeTelemetry;
pub use weakness::WeaknessPolicy;
