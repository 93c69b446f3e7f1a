use anima_types::FeedbackRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryId(pub Uuid);

impl MemoryId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for MemoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mem-{}", self.0)
    }
}

/// One processed event or feedback observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: MemoryId,
    pub event_type: String,
    /// Always in `[0, 1]`.
    pub significance: f64,
    pub created_at: DateTime<Utc>,
    /// Subjective time of the owning life when the entry was made.
    pub subjective_time: Option<f64>,
    /// Starts at 1.0 and decays during maintenance.
    pub weight: f64,
    pub feedback: Option<FeedbackRecord>,
}

impl MemoryEntry {
    pub fn new(event_type: impl Into<String>, significance: f64) -> Self {
        Self {
            id: MemoryId::generate(),
            event_type: event_type.into(),
            significance: unit(significance),
            created_at: Utc::now(),
            subjective_time: None,
            weight: 1.0,
            feedback: None,
        }
    }

    /// Entry recording a delayed feedback observation.
    pub fn from_feedback(record: FeedbackRecord) -> Self {
        let significance = record.net_change().abs();
        let kind = format!("feedback.{}", record.pattern);
        Self::new(kind, significance).with_feedback(record)
    }

    pub fn with_subjective_time(mut self, subjective_time: f64) -> Self {
        self.subjective_time = Some(subjective_time);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = unit(weight);
        self
    }

    pub fn with_feedback(mut self, feedback: FeedbackRecord) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn age_at(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

pub(crate) fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
