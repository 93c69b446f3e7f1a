//! Mutable state fields, their valid ranges, and typed deltas.
//!
//! Every writable numeric field is a variant of [`StateField`]. Names coming
//! from events are resolved through [`StateField::lookup`]; anything outside
//! the enum is reported back to the caller instead of being written.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Closed set of numeric fields that may change after birth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Energy,
    Integrity,
    Stability,
    Fatigue,
    Tension,
    Age,
    SubjectiveTime,
}

/// Inclusive range a field is clamped into on every write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldRange {
    pub min: f64,
    pub max: f64,
}

impl FieldRange {
    pub const fn closed(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn at_least(min: f64) -> Self {
        Self {
            min,
            max: f64::INFINITY,
        }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Result of resolving a field name from an event or a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLookup {
    Mutable(StateField),
    /// Identity fields: known, but never writable.
    Immutable,
    Unknown,
}

const IDENTITY_NAMES: &[&str] = &["id", "birth", "birth_time", "born_at"];

impl StateField {
    pub const ALL: [StateField; 7] = [
        StateField::Energy,
        StateField::Integrity,
        StateField::Stability,
        StateField::Fatigue,
        StateField::Tension,
        StateField::Age,
        StateField::SubjectiveTime,
    ];

    /// The three clamped core health fields.
    pub const VITALS: [StateField; 3] = [
        StateField::Energy,
        StateField::Integrity,
        StateField::Stability,
    ];

    pub fn range(self) -> FieldRange {
        match self {
            StateField::Energy => FieldRange::closed(0.0, 100.0),
            StateField::Integrity | StateField::Stability => FieldRange::closed(0.0, 1.0),
            StateField::Fatigue
            | StateField::Tension
            | StateField::Age
            | StateField::SubjectiveTime => FieldRange::at_least(0.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StateField::Energy => "energy",
            StateField::Integrity => "integrity",
            StateField::Stability => "stability",
            StateField::Fatigue => "fatigue",
            StateField::Tension => "tension",
            StateField::Age => "age",
            StateField::SubjectiveTime => "subjective_time",
        }
    }

    pub fn is_vital(self) -> bool {
        Self::VITALS.contains(&self)
    }

    /// Resolve a field name. Case and `-`/`_` are normalised.
    pub fn lookup(name: &str) -> FieldLookup {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        if IDENTITY_NAMES.contains(&normalized.as_str()) {
            return FieldLookup::Immutable;
        }
        Self::ALL
            .iter()
            .copied()
            .find(|field| field.name() == normalized)
            .map(FieldLookup::Mutable)
            .unwrap_or(FieldLookup::Unknown)
    }
}

impl std::fmt::Display for StateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StateField {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::lookup(s) {
            FieldLookup::Mutable(field) => Ok(field),
            FieldLookup::Immutable => Err(StateError::ImmutableField(s.to_string())),
            FieldLookup::Unknown => Err(StateError::UnknownField(s.to_string())),
        }
    }
}

/// A set of per-field additive changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta(BTreeMap<StateField, f64>);

/// A [`Delta`] parsed from free-form names, plus what was left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDelta {
    pub delta: Delta,
    pub unknown: Vec<String>,
    pub immutable: Vec<String>,
}

impl Delta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Delta::add`].
    pub fn with(mut self, field: StateField, value: f64) -> Self {
        self.add(field, value);
        self
    }

    /// Accumulate `value` onto any existing delta for `field`.
    pub fn add(&mut self, field: StateField, value: f64) {
        *self.0.entry(field).or_insert(0.0) += value;
    }

    pub fn get(&self, field: StateField) -> Option<f64> {
        self.0.get(&field).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StateField, f64)> + '_ {
        self.0.iter().map(|(field, value)| (*field, *value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every component multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Delta {
        Delta(self.0.iter().map(|(field, value)| (*field, value * factor)).collect())
    }

    /// Parse a name-keyed map. Unknown and identity names are reported, not written.
    pub fn from_named<I, K>(entries: I) -> ParsedDelta
    where
        I: IntoIterator<Item = (K, f64)>,
        K: AsRef<str>,
    {
        let mut parsed = ParsedDelta::default();
        for (name, value) in entries {
            let name = name.as_ref();
            match StateField::lookup(name) {
                FieldLookup::Mutable(field) => parsed.delta.add(field, value),
                FieldLookup::Immutable => parsed.immutable.push(name.to_string()),
                FieldLookup::Unknown => parsed.unknown.push(name.to_string()),
            }
        }
        parsed
    }
}

impl FromIterator<(StateField, f64)> for Delta {
    fn from_iter<T: IntoIterator<Item = (StateField, f64)>>(iter: T) -> Self {
        let mut delta = Delta::new();
        for (field, value) in iter {
            delta.add(field, value);
        }
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_normalises_names() {
        assert_eq!(
            StateField::lookup("Subjective-Time"),
            FieldLookup::Mutable(StateField::SubjectiveTime)
        );
        assert_eq!(StateField::lookup("energy"), FieldLookup::Mutable(StateField::Energy));
        assert_eq!(StateField::lookup("birth_time"), FieldLookup::Immutable);
        assert_eq!(StateField::lookup("mood"), FieldLookup::Unknown);
    }

    #[test]
    fn test_from_str_errors() {
        assert!(matches!("id".parse::<StateField>(), Err(StateError::ImmutableField(_))));
        assert!(matches!("mood".parse::<StateField>(), Err(StateError::UnknownField(_))));
    }

    #[test]
    fn test_ranges() {
        assert_eq!(StateField::Energy.range().clamp(140.0), 100.0);
        assert_eq!(StateField::Stability.range().clamp(-0.3), 0.0);
        assert_eq!(StateField::Tension.range().clamp(1e6), 1e6);
        assert!(StateField::Integrity.is_vital());
        assert!(!StateField::Age.is_vital());
    }

    #[test]
    fn test_from_named_reports_skipped() {
        let parsed = Delta::from_named([("energy", -5.0), ("mood", 1.0), ("id", 3.0), ("energy", 1.0)]);
        assert_eq!(parsed.delta.get(StateField::Energy), Some(-4.0));
        assert_eq!(parsed.unknown, vec!["mood".to_string()]);
        assert_eq!(parsed.immutable, vec!["id".to_string()]);
    }

    #[test]
    fn test_scaled() {
        let delta = Delta::new()
            .with(StateField::Energy, -10.0)
            .with(StateField::Tension, 0.4);
        let half = delta.scaled(0.5);
        assert_eq!(half.get(StateField::Energy), Some(-5.0));
        assert_eq!(half.get(StateField::Tension), Some(0.2));
    }

    #[test]
    fn test_delta_serializes_with_field_names() {
        let delta = Delta::new().with(StateField::SubjectiveTime, 1.5);
        let json = serde_json::to_string(&delta).unwrap();
        assert_eq!(json, r#"{"subjective_time":1.5}"#);
    }
}
