//! Periodic, failure-isolated persistence of the life state.

use std::panic::{catch_unwind, AssertUnwindSafe};

use anima_state::{LifeSnapshot, SharedState};
use tracing::{debug, warn};

use crate::cadence::Cadence;
use crate::error::{panic_message, PersistError};

/// Destination for snapshots. Closures of the right shape implement it.
pub trait SnapshotPersister: Send {
    fn persist(&mut self, snapshot: &LifeSnapshot) -> Result<(), PersistError>;
}

impl<F> SnapshotPersister for F
where
    F: FnMut(&LifeSnapshot) -> Result<(), PersistError> + Send,
{
    fn persist(&mut self, snapshot: &LifeSnapshot) -> Result<(), PersistError> {
        self(snapshot)
    }
}

/// A persister that can also hand back what it stored, for restore.
pub trait SnapshotStore: SnapshotPersister {
    fn load_latest(&self) -> Result<Option<LifeSnapshot>, PersistError>;
}

/// Decides when to snapshot and contains every persistence failure.
pub struct SnapshotManager {
    cadence: Cadence,
    persister: Box<dyn SnapshotPersister>,
    taken: u64,
    failed: u64,
    last_snapshot_tick: Option<u64>,
}

impl SnapshotManager {
    /// `period == 0` disables periodic snapshots; [`Self::snapshot_now`]
    /// still works.
    pub fn new(period: u64, persister: Box<dyn SnapshotPersister>) -> Self {
        Self {
            cadence: Cadence::every(period),
            persister,
            taken: 0,
            failed: 0,
            last_snapshot_tick: None,
        }
    }

    pub fn should_snapshot(&self, tick: u64) -> bool {
        self.cadence.is_due(tick)
    }

    pub fn is_enabled(&self) -> bool {
        self.cadence.is_enabled()
    }

    /// Snapshot if the current tick is due. Never fails; `false` means no
    /// snapshot was written.
    pub fn maybe_snapshot(&mut self, state: &SharedState) -> bool {
        if !self.should_snapshot(state.tick()) {
            return false;
        }
        self.snapshot_now(state)
    }

    /// Snapshot unconditionally, inside the same failure boundary.
    pub fn snapshot_now(&mut self, state: &SharedState) -> bool {
        let snapshot = state.snapshot();
        let tick = snapshot.tick;
        let persister = &mut self.persister;

        match catch_unwind(AssertUnwindSafe(|| persister.persist(&snapshot))) {
            Ok(Ok(())) => {
                self.taken += 1;
                self.last_snapshot_tick = Some(tick);
                debug!(tick, "Snapshot persisted");
                true
            }
            Ok(Err(e)) => {
                self.failed += 1;
                warn!(tick, error = %e, "Snapshot failed, will retry at next cadence");
                false
            }
            Err(payload) => {
                self.failed += 1;
                warn!(
                    tick,
                    panic = %panic_message(payload.as_ref()),
                    "Snapshot persister panicked"
                );
                false
            }
        }
    }

    pub fn taken(&self) -> u64 {
        self.taken
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    pub fn last_snapshot_tick(&self) -> Option<u64> {
        self.last_snapshot_tick
    }
}

impl std::fmt::Debug for SnapshotManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotManager")
            .field("period", &self.cadence.period())
            .field("taken", &self.taken)
            .field("failed", &self.failed)
            .finish()
    }
}
