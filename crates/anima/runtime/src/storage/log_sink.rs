//! Flush targets for the runtime log.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FlushError;
use crate::logs::{LogFlusher, LogRecord};

/// Appends each record as one JSON line.
#[derive(Debug)]
pub struct JsonlLogSink {
    path: PathBuf,
    file: File,
}

impl JsonlLogSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, FlushError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogFlusher for JsonlLogSink {
    fn flush(&mut self, records: &[LogRecord]) -> Result<(), FlushError> {
        let mut writer = BufWriter::new(&mut self.file);
        for record in records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Collects flushed batches in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    batches: Arc<Mutex<Vec<Vec<LogRecord>>>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of flush calls received, including empty batches.
    pub fn flush_count(&self) -> usize {
        self.batches.lock().len()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.batches.lock().iter().flatten().cloned().collect()
    }
}

impl LogFlusher for MemoryLogSink {
    fn flush(&mut self, records: &[LogRecord]) -> Result<(), FlushError> {
        self.batches.lock().push(records.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jsonl_sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("runtime.jsonl");
        let mut sink = JsonlLogSink::open(&path).unwrap();

        sink.flush(&[LogRecord::new(1, "tick", "done"), LogRecord::new(2, "tick", "done")])
            .unwrap();
        sink.flush(&[LogRecord::new(3, "failure", "meaning failed").with_field("stage", "event")])
            .unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<LogRecord> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2].fields["stage"], "event");
    }

    #[test]
    fn test_memory_sink_counts_empty_batches() {
        let sink = MemoryLogSink::new();
        let mut writer = sink.clone();
        writer.flush(&[]).unwrap();
        writer.flush(&[LogRecord::new(1, "tick", "done")]).unwrap();
        assert_eq!(sink.flush_count(), 2);
        assert_eq!(sink.records().len(), 1);
    }
}
