//! Slow learning and adaptation passes.
//!
//! Both move each tracked coefficient a fixed fraction of the way toward a
//! target derived from recent experience. They never optimize anything, and
//! the runtime still caps every per-key step.

use anima_memory::MemoryStats;
use anima_runtime::{AdaptationModel, CollaboratorError, LearningModel};
use anima_state::{AdaptationRecord, ParamTable};

/// Number of trailing adaptation records used to judge volatility.
const VOLATILITY_WINDOW: usize = 5;

fn toward(current: f64, target: f64, rate: f64) -> f64 {
    current + rate * (target - current)
}

/// Moves sensitivities toward the observed significance of each event type
/// and the ignore/dampen thresholds toward the overall significance level.
#[derive(Debug, Clone)]
pub struct BoundedLearning {
    rate: f64,
}

impl BoundedLearning {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
        }
    }
}

impl LearningModel for BoundedLearning {
    fn learn(&self, stats: &MemoryStats, current: &ParamTable) -> Result<ParamTable, CollaboratorError> {
        if stats.entries == 0 {
            return Ok(current.clone());
        }
        let mean = stats.mean_significance;
        if !mean.is_finite() {
            return Err(CollaboratorError::InvalidInput(
                "memory statistics carry a non-finite mean".to_string(),
            ));
        }

        Ok(current.map_values(|key, value| {
            let target = match key {
                "threshold.ignore" => Some(0.5 * mean),
                "threshold.dampen" => Some((mean + 0.3).min(1.0)),
                _ => key
                    .strip_prefix("sensitivity.")
                    .and_then(|kind| stats.mean_significance_by_type.get(kind).copied()),
            };
            match target {
                Some(target) => toward(value, target, self.rate),
                None => value,
            }
        }))
    }
}

/// Shifts behavior toward caution when the dampen threshold is low and
/// lowers the tension limit when recent adaptations have been large.
#[derive(Debug, Clone)]
pub struct BoundedAdaptation {
    rate: f64,
}

impl BoundedAdaptation {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 1.0),
        }
    }

    /// Mean magnitude of the last few adaptation records, capped at 1.
    pub fn volatility(history: &[AdaptationRecord]) -> f64 {
        let start = history.len().saturating_sub(VOLATILITY_WINDOW);
        let recent = &history[start..];
        if recent.is_empty() {
            return 0.0;
        }
        let mean = recent.iter().map(AdaptationRecord::magnitude).sum::<f64>() / recent.len() as f64;
        mean.min(1.0)
    }
}

impl AdaptationModel for BoundedAdaptation {
    fn adapt(
        &self,
        history: &[AdaptationRecord],
        learning: &ParamTable,
        current: &ParamTable,
    ) -> Result<ParamTable, CollaboratorError> {
        let dampen = learning.get_or("threshold.dampen", 0.7);
        let volatility = Self::volatility(history);

        Ok(current.map_values(|key, value| {
            let target = match key {
                "behavior.caution" => Some(1.0 - dampen),
                "behavior.openness" => Some(dampen),
                "threshold.tension" => Some(0.6 - 0.2 * volatility),
                _ => None,
            };
            match target {
                Some(target) => toward(value, target, self.rate),
                None => value,
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn stats(mean: f64, by_type: &[(&str, f64)]) -> MemoryStats {
        MemoryStats {
            entries: 10,
            capacity: 100,
            mean_significance: mean,
            mean_weight: 1.0,
            mean_significance_by_type: by_type.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_memory_proposes_no_change() {
        let table = ParamTable::learning_defaults();
        let proposed = BoundedLearning::new(0.5)
            .learn(&MemoryStats::default(), &table)
            .unwrap();
        assert_eq!(proposed, table);
    }

    #[test]
    fn test_learning_moves_toward_observations() {
        let table = ParamTable::learning_defaults();
        let proposed = BoundedLearning::new(0.5)
            .learn(&stats(0.2, &[("stress", 1.0)]), &table)
            .unwrap();
        // stress sensitivity 0.6 -> halfway to 1.0
        assert!((proposed.get_or("sensitivity.stress", 0.0) - 0.8).abs() < 1e-9);
        // ignore threshold 0.2 -> halfway to 0.1
        assert!((proposed.get_or("threshold.ignore", 0.0) - 0.15).abs() < 1e-9);
        // unobserved kinds and coefficients untouched
        assert_eq!(proposed.get("sensitivity.rest"), table.get("sensitivity.rest"));
        assert_eq!(proposed.get("coefficient.absorb"), table.get("coefficient.absorb"));
    }

    #[test]
    fn test_volatility_uses_recent_records() {
        let record = |delta: f64| AdaptationRecord {
            tick: 0,
            timestamp: Utc::now(),
            before: ParamTable::from_pairs([("a", 0.5)]),
            after: ParamTable::from_pairs([("a", 0.5 + delta)]),
        };
        assert_eq!(BoundedAdaptation::volatility(&[]), 0.0);
        let mut history = vec![record(0.4); 3];
        history.extend(vec![record(0.0); VOLATILITY_WINDOW]);
        assert_eq!(BoundedAdaptation::volatility(&history), 0.0);
        history.push(record(0.1));
        assert!((BoundedAdaptation::volatility(&history) - 0.02).abs() < 1e-9);
    }

    #[test]
    fn test_adaptation_tracks_learning_dampen() {
        let learning = ParamTable::from_pairs([("threshold.dampen", 0.9)]);
        let current = ParamTable::adaptation_defaults();
        let proposed = BoundedAdaptation::new(1.0).adapt(&[], &learning, &current).unwrap();
        assert!((proposed.get_or("behavior.caution", 0.0) - 0.1).abs() < 1e-9);
        assert!((proposed.get_or("behavior.openness", 0.0) - 0.9).abs() < 1e-9);
        assert_eq!(proposed.get("coefficient.recovery"), current.get("coefficient.recovery"));
    }

    proptest! {
        #[test]
        fn prop_learning_keeps_shape_and_range(mean in 0.0f64..=1.0, rate in 0.0f64..=1.0) {
            let table = ParamTable::learning_defaults();
            let proposed = BoundedLearning::new(rate)
                .learn(&stats(mean, &[("novelty", mean)]), &table)
                .unwrap();
            prop_assert_eq!(proposed.len(), table.len());
            for (_, value) in proposed.iter() {
                prop_assert!((0.0..=1.0).contains(&value));
            }
        }
    }
}
