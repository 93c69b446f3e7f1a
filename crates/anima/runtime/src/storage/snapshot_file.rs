//! Snapshot stores: one JSON file per tick on disk, or an in-memory list.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anima_state::LifeSnapshot;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::PersistError;
use crate::snapshot::{SnapshotPersister, SnapshotStore};

const SNAPSHOT_PREFIX: &str = "snapshot-";
const SNAPSHOT_SUFFIX: &str = ".json";

/// Writes `snapshot-{tick:012}.json` into a directory and keeps the newest
/// `keep` files. Each write goes to a temporary file first and is renamed
/// into place, so a crash mid-write never leaves a truncated snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    dir: PathBuf,
    keep: usize,
}

impl JsonFileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>, keep: usize) -> Result<Self, PersistError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            keep: keep.max(1),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, tick: u64) -> PathBuf {
        self.dir
            .join(format!("{}{:012}{}", SNAPSHOT_PREFIX, tick, SNAPSHOT_SUFFIX))
    }

    /// Ticks of the snapshots on disk, ascending.
    pub fn ticks(&self) -> Result<Vec<u64>, PersistError> {
        let mut ticks = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(tick) = name
                .strip_prefix(SNAPSHOT_PREFIX)
                .and_then(|rest| rest.strip_suffix(SNAPSHOT_SUFFIX))
                .and_then(|digits| digits.parse::<u64>().ok())
            {
                ticks.push(tick);
            }
        }
        ticks.sort_unstable();
        Ok(ticks)
    }

    pub fn load(&self, tick: u64) -> Result<LifeSnapshot, PersistError> {
        let bytes = fs::read(self.path_for(tick))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Remove all but the newest `keep` snapshots. Returns how many were removed.
    pub fn cleanup_old_snapshots(&self) -> Result<usize, PersistError> {
        let ticks = self.ticks()?;
        let excess = ticks.len().saturating_sub(self.keep);
        for tick in &ticks[..excess] {
            fs::remove_file(self.path_for(*tick))?;
        }
        if excess > 0 {
            debug!(removed = excess, keep = self.keep, "Pruned old snapshots");
        }
        Ok(excess)
    }
}

impl SnapshotPersister for JsonFileSnapshotStore {
    fn persist(&mut self, snapshot: &LifeSnapshot) -> Result<(), PersistError> {
        let path = self.path_for(snapshot.tick);
        let tmp = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        // The snapshot is on disk; a failed prune only delays retention.
        if let Err(e) = self.cleanup_old_snapshots() {
            warn!(tick = snapshot.tick, error = %e, "Failed to prune old snapshots");
        }
        Ok(())
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load_latest(&self) -> Result<Option<LifeSnapshot>, PersistError> {
        match self.ticks()?.last() {
            Some(tick) => self.load(*tick).map(Some),
            None => Ok(None),
        }
    }
}

/// Keeps snapshots in memory. Clones share the same storage.
#[derive(Debug, Clone)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<Mutex<Vec<LifeSnapshot>>>,
    keep: usize,
}

impl InMemorySnapshotStore {
    pub fn new(keep: usize) -> Self {
        Self {
            snapshots: Arc::new(Mutex::new(Vec::new())),
            keep: keep.max(1),
        }
    }

    pub fn ticks(&self) -> Vec<u64> {
        self.snapshots.lock().iter().map(|s| s.tick).collect()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new(16)
    }
}

impl SnapshotPersister for InMemorySnapshotStore {
    fn persist(&mut self, snapshot: &LifeSnapshot) -> Result<(), PersistError> {
        let mut snapshots = self.snapshots.lock();
        snapshots.push(snapshot.clone());
        let excess = snapshots.len().saturating_sub(self.keep);
        snapshots.drain(..excess);
        Ok(())
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load_latest(&self) -> Result<Option<LifeSnapshot>, PersistError> {
        Ok(self.snapshots.lock().last().cloned())
    }
}
