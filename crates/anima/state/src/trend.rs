//! Read-only trend aggregates over the audit log.

use serde::{Deserialize, Serialize};

use crate::audit::ParameterChange;
use crate::field::StateField;

/// Average rates below this magnitude count as stable.
const STABLE_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Rising,
    Falling,
    Stable,
}

/// Aggregate over the most recent audit records of one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    pub field: StateField,
    pub direction: TrendDirection,
    /// Mean change per audit record.
    pub average_rate: f64,
    /// Standard deviation of the per-record changes.
    pub volatility: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub samples: usize,
}

impl TrendSummary {
    pub fn empty(field: StateField) -> Self {
        Self {
            field,
            direction: TrendDirection::Stable,
            average_rate: 0.0,
            volatility: 0.0,
            min: None,
            max: None,
            samples: 0,
        }
    }
}

/// Min, max and mean of a bounded sample history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryAggregate {
    pub samples: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl HistoryAggregate {
    pub fn from_samples(samples: impl IntoIterator<Item = f64>) -> Self {
        let mut aggregate = Self::default();
        let mut sum = 0.0;
        for value in samples {
            aggregate.samples += 1;
            sum += value;
            aggregate.min = Some(aggregate.min.map_or(value, |m| m.min(value)));
            aggregate.max = Some(aggregate.max.map_or(value, |m| m.max(value)));
        }
        if aggregate.samples > 0 {
            aggregate.mean = Some(sum / aggregate.samples as f64);
        }
        aggregate
    }
}

/// Summarise the last `window` records of `field` from `changes` (oldest first).
pub fn summarize<'a, I>(field: StateField, changes: I, window: usize) -> TrendSummary
where
    I: IntoIterator<Item = &'a ParameterChange>,
{
    let matching: Vec<&ParameterChange> = changes
        .into_iter()
        .filter(|c| c.parameter == field.name())
        .collect();
    let start = matching.len().saturating_sub(window);
    let recent = &matching[start..];

    if recent.is_empty() {
        return TrendSummary::empty(field);
    }

    let deltas: Vec<f64> = recent.iter().map(|c| c.change()).collect();
    let n = deltas.len() as f64;
    let average_rate = deltas.iter().sum::<f64>() / n;
    let variance = deltas
        .iter()
        .map(|d| (d - average_rate).powi(2))
        .sum::<f64>()
        / n;

    let values = recent
        .iter()
        .flat_map(|c| [c.old_value, c.new_value]);
    let (min, max) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });

    let direction = if average_rate > STABLE_EPSILON {
        TrendDirection::Rising
    } else if average_rate < -STABLE_EPSILON {
        TrendDirection::Falling
    } else {
        TrendDirection::Stable
    };

    TrendSummary {
        field,
        direction,
        average_rate,
        volatility: variance.sqrt(),
        min: Some(min),
        max: Some(max),
        samples: recent.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{ChangeContext, ChangeReason};
    use chrono::Utc;

    fn change(parameter: &str, old_value: f64, new_value: f64) -> ParameterChange {
        ParameterChange {
            timestamp: Utc::now(),
            tick: 0,
            parameter: parameter.to_string(),
            old_value,
            new_value,
            reason: ChangeReason::DeltaApplication,
            context: ChangeContext::default(),
        }
    }

    #[test]
    fn test_falling_trend() {
        let changes = vec![
            change("energy", 100.0, 90.0),
            change("stability", 1.0, 0.9),
            change("energy", 90.0, 70.0),
        ];
        let trend = summarize(StateField::Energy, &changes, 10);
        assert_eq!(trend.direction, TrendDirection::Falling);
        assert_eq!(trend.samples, 2);
        assert!((trend.average_rate + 15.0).abs() < 1e-9);
        assert!((trend.volatility - 5.0).abs() < 1e-9);
        assert_eq!(trend.min, Some(70.0));
        assert_eq!(trend.max, Some(100.0));
    }

    #[test]
    fn test_window_limits_samples() {
        let changes: Vec<_> = (0..10)
            .map(|i| change("tension", i as f64, i as f64 + 1.0))
            .collect();
        let trend = summarize(StateField::Tension, &changes, 3);
        assert_eq!(trend.samples, 3);
        assert_eq!(trend.min, Some(7.0));
        assert_eq!(trend.direction, TrendDirection::Rising);
    }

    #[test]
    fn test_history_aggregate() {
        let aggregate = HistoryAggregate::from_samples([90.0, 70.0, 80.0]);
        assert_eq!(aggregate.samples, 3);
        assert_eq!(aggregate.min, Some(70.0));
        assert_eq!(aggregate.max, Some(90.0));
        assert_eq!(aggregate.mean, Some(80.0));
        assert_eq!(HistoryAggregate::from_samples([]), HistoryAggregate::default());
    }

    #[test]
    fn test_empty_is_stable() {
        let trend = summarize(StateField::Fatigue, &Vec::<ParameterChange>::new(), 10);
        assert_eq!(trend, TrendSummary::empty(StateField::Fatigue));
    }
}
