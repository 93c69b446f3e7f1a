//! Lock-guarded handle to a [`LifeState`].

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::field::{Delta, StateField};
use crate::snapshot::{LifeSnapshot, StatusView};
use crate::state::{DeltaReport, LifeState, Vitals};
use crate::trend::TrendSummary;

/// Cloneable, thread-safe handle to one life state.
///
/// Every accessor takes the lock for exactly its own duration. Compound
/// read-modify-write sequences go through [`SharedState::update`], whose
/// closure receives `&mut LifeState`. Calling back into the same handle from
/// inside that closure deadlocks; use the `&mut` reference instead.
#[derive(Clone)]
pub struct SharedState {
    inner: Arc<RwLock<LifeState>>,
}

impl SharedState {
    pub fn new(state: LifeState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Run `f` under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&LifeState) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run `f` under the write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut LifeState) -> R) -> R {
        f(&mut self.inner.write())
    }

    pub fn apply_delta(&self, delta: &Delta) -> DeltaReport {
        self.inner.write().apply_delta(delta)
    }

    pub fn set_field(&self, field: StateField, value: f64) -> Result<f64> {
        self.inner.write().set_field(field, value)
    }

    pub fn get(&self, field: StateField) -> f64 {
        self.inner.read().get(field)
    }

    pub fn vitals(&self) -> Vitals {
        self.inner.read().vitals()
    }

    pub fn tick(&self) -> u64 {
        self.inner.read().tick()
    }

    pub fn status(&self) -> StatusView {
        self.inner.read().status()
    }

    /// Consistent snapshot: the read lock is held for the whole projection,
    /// so no write (and no audit append) can interleave with the copy.
    pub fn snapshot(&self) -> LifeSnapshot {
        self.inner.read().to_snapshot()
    }

    pub fn trend(&self, field: StateField, window: usize) -> TrendSummary {
        self.inner.read().trend(field, window)
    }

    /// Energy, integrity and stability trends, computed under one read lock.
    pub fn vital_trends(&self, window: usize) -> Vec<TrendSummary> {
        self.inner.read().vital_trends(window)
    }

    /// Fatigue, tension and subjective-time trends, computed under one read lock.
    pub fn internal_dynamics_trends(&self, window: usize) -> Vec<TrendSummary> {
        self.inner.read().internal_dynamics_trends(window)
    }

    /// Replace the whole state, e.g. after restoring from a snapshot.
    pub fn replace(&self, state: LifeState) {
        *self.inner.write() = state;
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new(LifeState::default())
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner.try_read() {
            Some(state) => f
                .debug_struct("SharedState")
                .field("tick", &state.tick())
                .field("vitals", &state.vitals())
                .finish(),
            None => f.debug_struct("SharedState").field("locked", &true).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::ChangeReason;
    use std::thread;

    #[test]
    fn test_concurrent_deltas_are_serialised() {
        let shared = SharedState::default();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        shared.apply_delta(&Delta::new().with(StateField::Fatigue, 0.01));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!((shared.get(StateField::Fatigue) - 8.0).abs() < 1e-6);
        assert_eq!(shared.read(|s| s.audit().len()), 800);
    }

    #[test]
    fn test_snapshot_is_consistent_under_writers() {
        let shared = SharedState::default();
        let writer = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    shared.update(|state| {
                        state.apply_delta(&Delta::new().with(StateField::Energy, -0.1));
                        state.advance_tick(1.0, 0.0);
                    });
                }
            })
        };
        for _ in 0..50 {
            let snapshot = shared.snapshot();
            // One delta record, three drift records and one tick per update,
            // never half of one.
            let deltas = snapshot
                .audit_log
                .iter()
                .filter(|c| c.reason == ChangeReason::DeltaApplication)
                .count() as u64;
            assert_eq!(deltas, snapshot.tick);
            assert_eq!(snapshot.audit_log.len() as u64, 4 * snapshot.tick);
            let expected = 100.0 - 0.1 * snapshot.tick as f64;
            assert!((snapshot.vitals.energy - expected).abs() < 1e-6);
        }
        writer.join().unwrap();
        assert_eq!(shared.tick(), 200);
    }

    #[test]
    fn test_update_returns_closure_value() {
        let shared = SharedState::default();
        let tick = shared.update(|state| state.advance_tick(1.0, 0.2));
        assert_eq!(tick, 1);
        assert_eq!(shared.status().tick, 1);
    }
}
