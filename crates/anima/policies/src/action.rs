//! Coefficient-scaled response execution.

use anima_runtime::{ActionExecutor, CollaboratorError};
use anima_state::{Delta, SharedState, StateField};
use anima_types::ResponsePattern;
use tracing::{trace, warn};

/// Tension released by a dampen response, times `coefficient.recovery`.
const DAMPEN_TENSION_RELIEF: f64 = 0.1;

/// Applies the event impact scaled by the learning table's response
/// coefficients. Dampening also releases some tension.
#[derive(Debug, Clone, Default)]
pub struct ScaledAction {
    applied: u64,
}

impl ScaledAction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of non-ignore responses applied.
    pub fn applied(&self) -> u64 {
        self.applied
    }
}

impl ActionExecutor for ScaledAction {
    fn act(
        &mut self,
        pattern: ResponsePattern,
        impact: &Delta,
        state: &SharedState,
    ) -> Result<(), CollaboratorError> {
        let (absorb, dampen, recovery) = state.read(|s| {
            (
                s.learning().get_or("coefficient.absorb", 0.8),
                s.learning().get_or("coefficient.dampen", 0.4),
                s.adaptation().get_or("coefficient.recovery", 0.3),
            )
        });

        let delta = match pattern {
            ResponsePattern::Ignore => return Ok(()),
            ResponsePattern::Absorb => impact.scaled(absorb),
            ResponsePattern::Dampen => {
                let mut delta = impact.scaled(dampen);
                delta.add(StateField::Tension, -recovery * DAMPEN_TENSION_RELIEF);
                delta
            }
        };

        let report = state.apply_delta(&delta);
        if report.skipped > 0 {
            warn!(pattern = %pattern, skipped = report.skipped, "Non-finite impact components skipped");
        }
        self.applied += 1;
        trace!(pattern = %pattern, applied = report.applied, clamped = report.clamped, "Response applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impact() -> Delta {
        Delta::new().with(StateField::Energy, -10.0)
    }

    #[test]
    fn test_ignore_leaves_state_untouched() {
        let state = SharedState::default();
        let mut action = ScaledAction::new();
        action.act(ResponsePattern::Ignore, &impact(), &state).unwrap();
        assert_eq!(state.vitals().energy, 100.0);
        assert_eq!(action.applied(), 0);
    }

    #[test]
    fn test_absorb_and_dampen_scale_impact() {
        let state = SharedState::default();
        let mut action = ScaledAction::new();
        action.act(ResponsePattern::Absorb, &impact(), &state).unwrap();
        assert!((state.vitals().energy - 92.0).abs() < 1e-9);
        action.act(ResponsePattern::Dampen, &impact(), &state).unwrap();
        assert!((state.vitals().energy - 88.0).abs() < 1e-9);
        assert_eq!(action.applied(), 2);
    }

    #[test]
    fn test_dampen_releases_tension() {
        let state = SharedState::default();
        state.set_field(StateField::Tension, 0.5).unwrap();
        ScaledAction::new()
            .act(ResponsePattern::Dampen, &Delta::new(), &state)
            .unwrap();
        assert!((state.get(StateField::Tension) - 0.47).abs() < 1e-9);
    }
}
