//! Threshold-based response selection.

use anima_memory::MemoryEntry;
use anima_runtime::{CollaboratorError, DecisionModel, Interpretation};
use anima_state::{SharedState, StateField};
use anima_types::ResponsePattern;

/// Ignore trivial events, dampen heavy ones or anything arriving under high
/// tension, absorb the rest.
///
/// Recalled memories shift the decision: the weighted mean significance of
/// the activated entries, times `memory_bias`, is added before the dampen
/// comparison.
#[derive(Debug, Clone)]
pub struct ThresholdDecision {
    memory_bias: f64,
}

impl ThresholdDecision {
    pub fn new(memory_bias: f64) -> Self {
        Self {
            memory_bias: memory_bias.clamp(0.0, 1.0),
        }
    }

    /// Weighted mean significance of `activated`; 0 when empty.
    pub fn recall(activated: &[MemoryEntry]) -> f64 {
        let total_weight: f64 = activated.iter().map(|e| e.weight).sum();
        if total_weight <= 0.0 {
            return 0.0;
        }
        activated.iter().map(|e| e.significance * e.weight).sum::<f64>() / total_weight
    }
}

impl Default for ThresholdDecision {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl DecisionModel for ThresholdDecision {
    fn decide(
        &self,
        activated: &[MemoryEntry],
        meaning: &Interpretation,
        state: &SharedState,
    ) -> Result<ResponsePattern, CollaboratorError> {
        let significance = meaning.significance;
        if !significance.is_finite() {
            return Err(CollaboratorError::InvalidInput(
                "non-finite significance".to_string(),
            ));
        }

        let (ignore, dampen, tension, tension_limit) = state.read(|s| {
            (
                s.learning().get_or("threshold.ignore", 0.2),
                s.learning().get_or("threshold.dampen", 0.7),
                s.get(StateField::Tension),
                s.adaptation().get_or("threshold.tension", 0.6),
            )
        });

        if significance < ignore {
            return Ok(ResponsePattern::Ignore);
        }
        let weighted = significance + self.memory_bias * Self::recall(activated);
        if weighted > dampen || tension >= tension_limit {
            return Ok(ResponsePattern::Dampen);
        }
        Ok(ResponsePattern::Absorb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_state::Delta;

    fn meaning(significance: f64) -> Interpretation {
        Interpretation {
            significance,
            impact: Delta::new(),
        }
    }

    #[test]
    fn test_thresholds_partition_significance() {
        let state = SharedState::default();
        let decision = ThresholdDecision::new(0.0);
        assert_eq!(decision.decide(&[], &meaning(0.1), &state).unwrap(), ResponsePattern::Ignore);
        assert_eq!(decision.decide(&[], &meaning(0.5), &state).unwrap(), ResponsePattern::Absorb);
        assert_eq!(decision.decide(&[], &meaning(0.9), &state).unwrap(), ResponsePattern::Dampen);
    }

    #[test]
    fn test_high_tension_dampens() {
        let state = SharedState::default();
        state.set_field(StateField::Tension, 0.9).unwrap();
        let decision = ThresholdDecision::new(0.0);
        assert_eq!(decision.decide(&[], &meaning(0.5), &state).unwrap(), ResponsePattern::Dampen);
        // Trivial events are still ignored.
        assert_eq!(decision.decide(&[], &meaning(0.05), &state).unwrap(), ResponsePattern::Ignore);
    }

    #[test]
    fn test_significant_memories_bias_toward_dampen() {
        let state = SharedState::default();
        let recalled = vec![MemoryEntry::new("stress", 1.0), MemoryEntry::new("stress", 0.8)];
        let decision = ThresholdDecision::new(0.5);
        assert_eq!(decision.decide(&[], &meaning(0.5), &state).unwrap(), ResponsePattern::Absorb);
        assert_eq!(
            decision.decide(&recalled, &meaning(0.5), &state).unwrap(),
            ResponsePattern::Dampen
        );
    }

    #[test]
    fn test_recall_is_weighted() {
        let recalled = vec![
            MemoryEntry::new("a", 1.0).with_weight(0.25),
            MemoryEntry::new("b", 0.0).with_weight(0.75),
        ];
        assert!((ThresholdDecision::recall(&recalled) - 0.25).abs() < 1e-9);
        assert_eq!(ThresholdDecision::recall(&[]), 0.0);
    }
}
