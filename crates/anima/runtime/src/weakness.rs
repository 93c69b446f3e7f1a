//! Degradation applied while any vital sits at or below the weakness
//! threshold. Weakness accelerates decline; it never stops the life.

use anima_state::{Delta, StateField, Vitals};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaknessPolicy {
    /// Inclusive threshold compared against each raw vital.
    pub threshold: f64,
    /// Energy loss per unit of `dt`.
    pub base_rate: f64,
    pub stability_multiplier: f64,
    pub integrity_multiplier: f64,
}

impl Default for WeaknessPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            base_rate: 0.01,
            stability_multiplier: 2.0,
            integrity_multiplier: 2.0,
        }
    }
}

impl WeaknessPolicy {
    pub fn is_weak(&self, vitals: &Vitals) -> bool {
        vitals.energy <= self.threshold
            || vitals.integrity <= self.threshold
            || vitals.stability <= self.threshold
    }

    /// Negative deltas for `dt` elapsed. Pure; the caller applies them.
    pub fn penalty(&self, dt: f64) -> Delta {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let base = self.base_rate.abs() * dt;
        Delta::new()
            .with(StateField::Energy, -base)
            .with(StateField::Stability, -base * self.stability_multiplier.abs())
            .with(StateField::Integrity, -base * self.integrity_multiplier.abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vitals(energy: f64, integrity: f64, stability: f64) -> Vitals {
        Vitals {
            energy,
            integrity,
            stability,
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let policy = WeaknessPolicy::default();
        assert!(policy.is_weak(&vitals(0.05, 1.0, 1.0)));
        assert!(policy.is_weak(&vitals(50.0, 0.05, 1.0)));
        assert!(policy.is_weak(&vitals(50.0, 1.0, 0.0)));
        assert!(!policy.is_weak(&vitals(0.0501, 0.06, 0.5)));
    }

    #[test]
    fn test_penalty_shape() {
        let policy = WeaknessPolicy::default();
        let delta = policy.penalty(2.0);
        assert!((delta.get(StateField::Energy).unwrap() + 0.02).abs() < 1e-12);
        assert!((delta.get(StateField::Stability).unwrap() + 0.04).abs() < 1e-12);
        assert!((delta.get(StateField::Integrity).unwrap() + 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_penalty_ignores_bad_dt() {
        let policy = WeaknessPolicy::default();
        assert_eq!(policy.penalty(f64::NAN).get(StateField::Energy), Some(-0.0));
        assert_eq!(policy.penalty(-3.0).get(StateField::Energy), Some(-0.0));
    }

    proptest! {
        #[test]
        fn property_is_weak_iff_any_vital_at_or_below_threshold(
            energy in 0.0f64..=100.0,
            integrity in 0.0f64..=1.0,
            stability in 0.0f64..=1.0,
            threshold in 0.0f64..=1.0,
        ) {
            let policy = WeaknessPolicy { threshold, ..Default::default() };
            let expected = energy <= threshold || integrity <= threshold || stability <= threshold;
            prop_assert_eq!(policy.is_weak(&vitals(energy, integrity, stability)), expected);
        }

        #[test]
        fn property_penalty_monotonic_in_dt(
            dt in 0.0f64..1000.0,
            extra in 0.0f64..1000.0,
            base_rate in 0.0f64..1.0,
            multiplier in 1.0f64..10.0,
        ) {
            let policy = WeaknessPolicy {
                base_rate,
                stability_multiplier: multiplier,
                integrity_multiplier: multiplier,
                ..Default::default()
            };
            let short = policy.penalty(dt);
            let long = policy.penalty(dt + extra);
            for field in [StateField::Energy, StateField::Stability, StateField::Integrity] {
                prop_assert!(long.get(field).unwrap().abs() >= short.get(field).unwrap().abs());
            }
            let energy = short.get(StateField::Energy).unwrap().abs();
            prop_assert!(short.get(StateField::Integrity).unwrap().abs() >= energy);
            prop_assert!(short.get(StateField::Stability).unwrap().abs() >= energy);
        }
    }
}
