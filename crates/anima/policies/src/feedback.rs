//! Delayed consequence tracking.

use std::collections::VecDeque;

use anima_runtime::FeedbackTracker;
use anima_state::StatusView;
use anima_types::{FeedbackRecord, ResponsePattern};
use tracing::debug;

#[derive(Debug, Clone)]
struct Pending {
    pattern: ResponsePattern,
    at: StatusView,
    observations: u64,
}

/// Reports how the vitals moved between a response and `delay` observations
/// later. Registrations past `max_pending` drop the oldest.
#[derive(Debug, Clone)]
pub struct DelayedFeedback {
    delay: u64,
    max_pending: usize,
    pending: VecDeque<Pending>,
    dropped: u64,
}

impl DelayedFeedback {
    pub fn new(delay: u64, max_pending: usize) -> Self {
        Self {
            delay,
            max_pending: max_pending.max(1),
            pending: VecDeque::new(),
            dropped: 0,
        }
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl FeedbackTracker for DelayedFeedback {
    fn register(&mut self, pattern: ResponsePattern, at: &StatusView) {
        if self.pending.len() >= self.max_pending {
            self.pending.pop_front();
            self.dropped += 1;
            debug!(dropped = self.dropped, "Feedback queue full, dropping oldest");
        }
        self.pending.push_back(Pending {
            pattern,
            at: at.clone(),
            observations: 0,
        });
    }

    fn observe(&mut self, now: &StatusView) -> Vec<FeedbackRecord> {
        for pending in self.pending.iter_mut() {
            pending.observations += 1;
        }

        // Registration order means the matured ones are at the front.
        let mut records = Vec::new();
        while self
            .pending
            .front()
            .is_some_and(|p| p.observations >= self.delay)
        {
            let Some(pending) = self.pending.pop_front() else {
                break;
            };
            records.push(FeedbackRecord {
                pattern: pending.pattern,
                registered_tick: pending.at.tick,
                observed_tick: now.tick,
                energy_change: now.vitals.energy - pending.at.vitals.energy,
                integrity_change: now.vitals.integrity - pending.at.vitals.integrity,
                stability_change: now.vitals.stability - pending.at.vitals.stability,
            });
        }
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_state::{SharedState, StateField};

    #[test]
    fn test_record_emitted_after_delay() {
        let state = SharedState::default();
        let mut feedback = DelayedFeedback::new(2, 16);
        feedback.register(ResponsePattern::Absorb, &state.status());

        assert!(feedback.observe(&state.status()).is_empty());
        state.set_field(StateField::Energy, 80.0).unwrap();
        state.update(|s| s.advance_tick(1.0, 0.0));

        let records = feedback.observe(&state.status());
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.pattern, ResponsePattern::Absorb);
        assert_eq!(record.delay(), 1);
        assert!((record.energy_change + 20.0).abs() < 1e-9);
        assert_eq!(feedback.pending(), 0);
    }

    #[test]
    fn test_zero_delay_reports_on_first_observation() {
        let state = SharedState::default();
        let mut feedback = DelayedFeedback::new(0, 16);
        feedback.register(ResponsePattern::Dampen, &state.status());
        assert_eq!(feedback.observe(&state.status()).len(), 1);
    }

    #[test]
    fn test_queue_is_bounded() {
        let state = SharedState::default();
        let mut feedback = DelayedFeedback::new(10, 3);
        for _ in 0..5 {
            feedback.register(ResponsePattern::Ignore, &state.status());
        }
        assert_eq!(feedback.pending(), 3);
        assert_eq!(feedback.dropped(), 2);
    }
}
