//! Policy-parameter tables and adaptation history.
//!
//! Both tables are small fixed-shape maps of named coefficients in `[0, 1]`.
//! The key set is fixed when the table is created; updates to keys outside
//! it are ignored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which of the two policy tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Learning,
    Adaptation,
}

impl TableKind {
    /// Prefix used for audit parameter names (`learning.sensitivity.stress`).
    pub fn prefix(self) -> &'static str {
        match self {
            TableKind::Learning => "learning",
            TableKind::Adaptation => "adaptation",
        }
    }
}

/// Fixed-shape table of named unit-range coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamTable {
    values: BTreeMap<String, f64>,
}

impl ParamTable {
    /// Build a table from `(key, value)` pairs; values are clamped to `[0, 1]`.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), unit(v)))
                .collect(),
        }
    }

    /// Learning-style sensitivities, thresholds and coefficients.
    pub fn learning_defaults() -> Self {
        Self::from_pairs([
            ("sensitivity.default", 0.5),
            ("sensitivity.stress", 0.6),
            ("sensitivity.novelty", 0.5),
            ("sensitivity.rest", 0.4),
            ("threshold.ignore", 0.2),
            ("threshold.dampen", 0.7),
            ("coefficient.absorb", 0.8),
            ("coefficient.dampen", 0.4),
        ])
    }

    /// Adaptation-style behavior sensitivities, thresholds and coefficients.
    pub fn adaptation_defaults() -> Self {
        Self::from_pairs([
            ("behavior.caution", 0.5),
            ("behavior.openness", 0.5),
            ("threshold.tension", 0.6),
            ("coefficient.recovery", 0.3),
        ])
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.values.get(key).copied()
    }

    /// Value for `key`, or `fallback` if the key is not part of this table.
    pub fn get_or(&self, key: &str, fallback: f64) -> f64 {
        self.get(key).unwrap_or(fallback)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Overwrite an existing key. Returns the previous value, or `None`
    /// (and writes nothing) when the key is outside the fixed shape.
    pub(crate) fn set(&mut self, key: &str, value: f64) -> Option<f64> {
        let slot = self.values.get_mut(key)?;
        let old = *slot;
        *slot = unit(value);
        Some(old)
    }

    /// Same shape, with `f` applied to each value (result clamped).
    pub fn map_values(&self, mut f: impl FnMut(&str, f64) -> f64) -> ParamTable {
        Self {
            values: self
                .values
                .iter()
                .map(|(k, v)| (k.clone(), unit(f(k, *v))))
                .collect(),
        }
    }
}

fn unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// One applied table change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedChange {
    pub key: String,
    pub old_value: f64,
    pub new_value: f64,
    /// The proposal exceeded the per-call step cap or the unit range.
    pub clamped: bool,
}

/// Before/after record of one adaptation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptationRecord {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub before: ParamTable,
    pub after: ParamTable,
}

impl AdaptationRecord {
    /// Sum of absolute per-key changes.
    pub fn magnitude(&self) -> f64 {
        self.after
            .iter()
            .map(|(k, v)| (v - self.before.get_or(k, v)).abs())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_clamped_to_unit() {
        let table = ParamTable::from_pairs([("a", 1.7), ("b", -0.2), ("c", f64::NAN)]);
        assert_eq!(table.get("a"), Some(1.0));
        assert_eq!(table.get("b"), Some(0.0));
        assert_eq!(table.get("c"), Some(0.0));
    }

    #[test]
    fn test_set_respects_fixed_shape() {
        let mut table = ParamTable::learning_defaults();
        let len = table.len();
        assert_eq!(table.set("threshold.ignore", 0.3), Some(0.2));
        assert_eq!(table.set("threshold.unknown", 0.3), None);
        assert_eq!(table.len(), len);
        assert!(!table.contains("threshold.unknown"));
    }

    #[test]
    fn test_adaptation_record_magnitude() {
        let before = ParamTable::from_pairs([("a", 0.5), ("b", 0.5)]);
        let after = ParamTable::from_pairs([("a", 0.55), ("b", 0.45)]);
        let record = AdaptationRecord {
            tick: 10,
            timestamp: Utc::now(),
            before,
            after,
        };
        assert!((record.magnitude() - 0.1).abs() < 1e-9);
    }
}
