//! # Anima Types
//!
//! Plain data shared by every Anima crate:
//!
//! - [`Event`]: an externally generated stimulus drained by the runtime loop
//! - [`ResponsePattern`]: the decision taken for one event
//! - [`FeedbackRecord`]: a delayed observation of what a response did to the vitals
//!
//! Nothing here carries behavior beyond construction helpers; the policy
//! functions that interpret these values live in the runtime and policy crates.

#![deny(unsafe_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub uuid::Uuid);

impl EventId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::generate()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "evt-{}", self.0)
    }
}

/// An external stimulus.
///
/// `impact` is keyed by field name rather than a typed field so that event
/// authors can target fields this build does not know about; the state crate
/// drops unknown names when it parses the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: EventId,

    /// Event type tag (e.g. `"stress"`, `"rest"`).
    pub kind: String,

    /// Raw intensity in `[0, 1]`.
    #[serde(default = "default_intensity")]
    pub intensity: f64,

    /// Proposed per-field deltas, before any interpretation.
    #[serde(default)]
    pub impact: BTreeMap<String, f64>,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

fn default_intensity() -> f64 {
    0.5
}

impl Event {
    pub fn new(kind: impl Into<String>, intensity: f64) -> Self {
        Self {
            id: EventId::generate(),
            kind: kind.into(),
            intensity,
            impact: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Add a proposed delta for a named field.
    pub fn with_impact(mut self, field: impl Into<String>, delta: f64) -> Self {
        self.impact.insert(field.into(), delta);
        self
    }

    /// Intensity clamped into `[0, 1]`; non-finite values count as zero.
    pub fn bounded_intensity(&self) -> f64 {
        if self.intensity.is_finite() {
            self.intensity.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Response chosen by the decision collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponsePattern {
    /// Leave the state untouched.
    Ignore,
    /// Take the impact in, scaled by the absorb coefficient.
    Absorb,
    /// Take a reduced share of the impact.
    Dampen,
}

impl ResponsePattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponsePattern::Ignore => "ignore",
            ResponsePattern::Absorb => "absorb",
            ResponsePattern::Dampen => "dampen",
        }
    }
}

impl std::fmt::Display for ResponsePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delayed consequence of a response, observed some ticks after it was taken.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub pattern: ResponsePattern,
    pub registered_tick: u64,
    pub observed_tick: u64,
    pub energy_change: f64,
    pub integrity_change: f64,
    pub stability_change: f64,
}

impl FeedbackRecord {
    /// Net change across the vitals, with energy normalised to the unit range.
    pub fn net_change(&self) -> f64 {
        self.energy_change / 100.0 + self.integrity_change + self.stability_change
    }

    /// Ticks between registration and observation.
    pub fn delay(&self) -> u64 {
        self.observed_tick.saturating_sub(self.registered_tick)
    }
}
