//! Anima life state
//!
//! Validated, clamped vitals and internal dynamics for one simulated life,
//! with a capped parameter-change audit log, policy tables for learning and
//! adaptation, and plain-data snapshot projections.
//!
//! # Invariants
//!
//! - `energy` stays in `[0, 100]`; `integrity` and `stability` in `[0, 1]`.
//! - `fatigue`, `tension`, `age` and `subjective_time` are never negative.
//! - Identity (`id`, `born_at`) is fixed at construction.
//! - Every write is audited, per-tick drift included, and the audit log
//!   never exceeds its cap.
//! - A life never transitions to not-alive; low vitals degrade behavior only.

#![deny(unsafe_code)]

pub mod audit;
pub mod error;
pub mod field;
pub mod params;
pub mod shared;
pub mod snapshot;
pub mod state;
pub mod trend;

pub use audit::{AuditLog, ChangeContext, ChangeReason, ParameterChange};
pub use error::{Result, StateError};
pub use field::{Delta, FieldLookup, FieldRange, ParsedDelta, StateField};
pub use params::{AdaptationRecord, AppliedChange, ParamTable, TableKind};
pub use shared::SharedState;
pub use snapshot::{LifeSnapshot, StatusView, SNAPSHOT_FORMAT_VERSION, STATUS_TREND_WINDOW};
pub use state::{DeltaReport, Identity, LifeState, StateConfig, Vitals};
pub use trend::{summarize, HistoryAggregate, TrendDirection, TrendSummary};
