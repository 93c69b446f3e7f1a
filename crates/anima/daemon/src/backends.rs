//! Snapshot and log backends selected from configuration.

use anima_runtime::storage::{InMemorySnapshotStore, JsonFileSnapshotStore, JsonlLogSink, MemoryLogSink};
use anima_runtime::{FlushError, LifeConfig, LogFlusher, LogRecord, PersistError, SnapshotPersister, SnapshotStore};
use anima_state::LifeSnapshot;

/// Snapshot storage: a directory of JSON files, or process memory.
#[derive(Debug, Clone)]
pub enum SnapshotBackend {
    Files(JsonFileSnapshotStore),
    Memory(InMemorySnapshotStore),
}

impl SnapshotBackend {
    pub fn from_config(config: &LifeConfig) -> Result<Self, PersistError> {
        let keep = config.snapshot.keep;
        match &config.snapshot.directory {
            Some(dir) => Ok(Self::Files(JsonFileSnapshotStore::new(dir, keep)?)),
            None => Ok(Self::Memory(InMemorySnapshotStore::new(keep))),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Files(store) => store.dir().display().to_string(),
            Self::Memory(_) => "memory".to_string(),
        }
    }
}

impl SnapshotPersister for SnapshotBackend {
    fn persist(&mut self, snapshot: &LifeSnapshot) -> Result<(), PersistError> {
        match self {
            Self::Files(store) => store.persist(snapshot),
            Self::Memory(store) => store.persist(snapshot),
        }
    }
}

impl SnapshotStore for SnapshotBackend {
    fn load_latest(&self) -> Result<Option<LifeSnapshot>, PersistError> {
        match self {
            Self::Files(store) => store.load_latest(),
            Self::Memory(store) => store.load_latest(),
        }
    }
}

/// Flushed runtime log destination.
#[derive(Debug)]
pub enum LogBackend {
    File(JsonlLogSink),
    Memory(MemoryLogSink),
}

impl LogBackend {
    pub fn from_config(config: &LifeConfig) -> Result<Self, FlushError> {
        match &config.logs.path {
            Some(path) => Ok(Self::File(JsonlLogSink::open(path)?)),
            None => Ok(Self::Memory(MemoryLogSink::new())),
        }
    }
}

impl LogFlusher for LogBackend {
    fn flush(&mut self, records: &[LogRecord]) -> Result<(), FlushError> {
        match self {
            Self::File(sink) => sink.flush(records),
            Self::Memory(sink) => sink.flush(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anima_state::LifeState;

    #[test]
    fn test_directory_selects_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LifeConfig::default();
        config.snapshot.directory = Some(dir.path().join("snapshots"));

        let mut backend = SnapshotBackend::from_config(&config).unwrap();
        assert!(matches!(backend, SnapshotBackend::Files(_)));

        let snapshot = LifeState::default().to_snapshot();
        backend.persist(&snapshot).unwrap();
        let latest = backend.load_latest().unwrap().unwrap();
        assert_eq!(latest.tick, snapshot.tick);
    }

    #[test]
    fn test_defaults_stay_in_memory() {
        let config = LifeConfig::default();
        assert!(matches!(
            SnapshotBackend::from_config(&config).unwrap(),
            SnapshotBackend::Memory(_)
        ));
        let mut logs = LogBackend::from_config(&config).unwrap();
        assert!(matches!(logs, LogBackend::Memory(_)));
        logs.flush(&[LogRecord::new(1, "tick", "ok")]).unwrap();
    }

    #[test]
    fn test_log_path_opens_jsonl_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = LifeConfig::default();
        config.logs.path = Some(dir.path().join("life.jsonl"));
        let mut logs = LogBackend::from_config(&config).unwrap();
        logs.flush(&[LogRecord::new(1, "tick", "ok")]).unwrap();
        let written = std::fs::read_to_string(dir.path().join("life.jsonl")).unwrap();
        assert_eq!(written.lines().count(), 1);
    }
}
