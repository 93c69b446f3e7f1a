//! Sensitivity-table interpretation.

use anima_runtime::{CollaboratorError, Interpretation, MeaningModel};
use anima_state::{Delta, SharedState};
use anima_types::Event;
use tracing::trace;

const DEFAULT_SENSITIVITY: &str = "sensitivity.default";

/// Significance is `intensity × sensitivity(kind)`, looked up in the live
/// learning table so learning passes change interpretation. The event
/// payload becomes the impact, scaled by significance.
#[derive(Debug, Clone, Default)]
pub struct TableMeaning;

impl TableMeaning {
    pub fn new() -> Self {
        Self
    }
}

impl MeaningModel for TableMeaning {
    fn interpret(&self, event: &Event, state: &SharedState) -> Result<Interpretation, CollaboratorError> {
        if !event.intensity.is_finite() {
            return Err(CollaboratorError::InvalidInput(format!(
                "event {} has non-finite intensity",
                event.id
            )));
        }

        let sensitivity = state.read(|s| {
            let learning = s.learning();
            learning
                .get(&format!("sensitivity.{}", event.kind))
                .unwrap_or_else(|| learning.get_or(DEFAULT_SENSITIVITY, 0.5))
        });
        let significance = (event.bounded_intensity() * sensitivity).clamp(0.0, 1.0);

        let parsed = Delta::from_named(event.impact.iter().map(|(name, value)| (name.as_str(), *value)));
        if !parsed.unknown.is_empty() || !parsed.immutable.is_empty() {
            trace!(
                event = %event.id,
                unknown = ?parsed.unknown,
                immutable = ?parsed.immutable,
                "Ignoring impact fields"
            );
        }

        Ok(Interpretation {
            significance,
            impact: parsed.delta.scaled(significance),
        })
    }
}
