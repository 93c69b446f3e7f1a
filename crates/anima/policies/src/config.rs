//! Tuning for the baseline collaborators.

use serde::{Deserialize, Serialize};

use crate::error::{PolicyError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Observations between a response and its feedback record.
    pub feedback_delay: u64,
    /// Oldest registrations are dropped past this many.
    pub max_pending_feedback: usize,
    /// How strongly recalled memories push a decision toward dampen.
    pub memory_bias: f64,
    /// Fraction of the gap to its target a learning pass proposes.
    pub learning_rate: f64,
    /// Fraction of the gap to its target an adaptation pass proposes.
    pub adaptation_rate: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            feedback_delay: 5,
            max_pending_feedback: 1024,
            memory_bias: 0.2,
            learning_rate: 0.1,
            adaptation_rate: 0.05,
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_pending_feedback == 0 {
            return Err(PolicyError::InvalidSetting {
                name: "max_pending_feedback",
                reason: "must be > 0".to_string(),
            });
        }
        for (name, value) in [
            ("memory_bias", self.memory_bias),
            ("learning_rate", self.learning_rate),
            ("adaptation_rate", self.adaptation_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PolicyError::InvalidSetting {
                    name,
                    reason: format!("must be in [0, 1], got {}", value),
                });
            }
        }
        Ok(())
    }
}
