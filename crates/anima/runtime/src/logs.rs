//! Buffered runtime log with phase-gated flushing.
//!
//! Records accumulate in a bounded [`LogBuffer`] and are handed to a
//! [`LogFlusher`] in batches. The loop offers a flush at five points
//! ([`FlushPhase`]); each phase is gated by its own setting except
//! `Shutdown`, which always flushes. The buffer is cleared and
//! `last_flush_tick` advanced only after a successful flush, so a failed
//! batch is retried at the next eligible trigger.

use std::collections::{BTreeMap, VecDeque};
use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{panic_message, FlushError, Result, RuntimeError};

/// One buffered log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogRecord {
    pub fn new(tick: u64, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tick,
            timestamp: Utc::now(),
            kind: kind.into(),
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// The point in the loop at which a flush is offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPhase {
    Tick,
    BeforeSnapshot,
    AfterSnapshot,
    Exception,
    Shutdown,
}

impl FlushPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushPhase::Tick => "tick",
            FlushPhase::BeforeSnapshot => "before-snapshot",
            FlushPhase::AfterSnapshot => "after-snapshot",
            FlushPhase::Exception => "exception",
            FlushPhase::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for FlushPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives each pending batch. Closures of the right shape implement it.
pub trait LogFlusher: Send {
    fn flush(&mut self, records: &[LogRecord]) -> std::result::Result<(), FlushError>;
}

impl<F> LogFlusher for F
where
    F: FnMut(&[LogRecord]) -> std::result::Result<(), FlushError> + Send,
{
    fn flush(&mut self, records: &[LogRecord]) -> std::result::Result<(), FlushError> {
        self(records)
    }
}

/// Bounded FIFO of unflushed records. When full, the oldest are dropped.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    records: VecDeque<LogRecord>,
    capacity: usize,
    dropped: u64,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    pub fn push(&mut self, record: LogRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
            self.dropped += 1;
        }
        self.records.push_back(record);
    }

    /// Pending records, oldest first, as one slice.
    pub fn pending(&mut self) -> &[LogRecord] {
        self.records.make_contiguous()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogManagerConfig {
    /// Minimum ticks between `Tick`-phase flushes. Must be positive.
    pub flush_period: u64,
    pub flush_before_snapshot: bool,
    pub flush_after_snapshot: bool,
    pub flush_on_exception: bool,
    pub buffer_capacity: usize,
}

impl Default for LogManagerConfig {
    fn default() -> Self {
        Self {
            flush_period: 10,
            flush_before_snapshot: true,
            flush_after_snapshot: false,
            flush_on_exception: true,
            buffer_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Phase disabled or not yet due.
    Skipped,
    Flushed { records: usize },
    Failed,
}

impl FlushOutcome {
    pub fn is_flushed(&self) -> bool {
        matches!(self, FlushOutcome::Flushed { .. })
    }
}

pub struct LogManager {
    config: LogManagerConfig,
    buffer: LogBuffer,
    flusher: Box<dyn LogFlusher>,
    last_flush_tick: u64,
    flushes: u64,
    failures: u64,
}

impl LogManager {
    pub fn new(config: LogManagerConfig, flusher: Box<dyn LogFlusher>) -> Result<Self> {
        if config.flush_period == 0 {
            return Err(RuntimeError::InvalidConfig(
                "logs.flush_period must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            buffer: LogBuffer::new(config.buffer_capacity),
            config,
            flusher,
            last_flush_tick: 0,
            flushes: 0,
            failures: 0,
        })
    }

    pub fn record(&mut self, record: LogRecord) {
        self.buffer.push(record);
    }

    /// Whether `phase` would flush at `tick`.
    pub fn is_due(&self, tick: u64, phase: FlushPhase) -> bool {
        match phase {
            FlushPhase::Tick => tick.saturating_sub(self.last_flush_tick) >= self.config.flush_period,
            FlushPhase::BeforeSnapshot => self.config.flush_before_snapshot,
            FlushPhase::AfterSnapshot => self.config.flush_after_snapshot,
            FlushPhase::Exception => self.config.flush_on_exception,
            FlushPhase::Shutdown => true,
        }
    }

    /// Offer a flush. Never fails; errors and panics in the flusher are
    /// logged and reported as [`FlushOutcome::Failed`].
    pub fn maybe_flush(&mut self, tick: u64, phase: FlushPhase) -> FlushOutcome {
        if !self.is_due(tick, phase) {
            return FlushOutcome::Skipped;
        }

        let flusher = &mut self.flusher;
        let records = self.buffer.pending();
        let count = records.len();

        match catch_unwind(AssertUnwindSafe(|| flusher.flush(records))) {
            Ok(Ok(())) => {
                self.buffer.clear();
                self.last_flush_tick = tick;
                self.flushes += 1;
                debug!(tick, phase = %phase, records = count, "Flushed runtime log");
                FlushOutcome::Flushed { records: count }
            }
            Ok(Err(e)) => {
                self.failures += 1;
                warn!(tick, phase = %phase, error = %e, "Log flush failed, keeping buffer");
                FlushOutcome::Failed
            }
            Err(payload) => {
                self.failures += 1;
                warn!(
                    tick,
                    phase = %phase,
                    panic = %panic_message(payload.as_ref()),
                    "Log flusher panicked, keeping buffer"
                );
                FlushOutcome::Failed
            }
        }
    }

    pub fn last_flush_tick(&self) -> u64 {
        self.last_flush_tick
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn dropped(&self) -> u64 {
        self.buffer.dropped()
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("config", &self.config)
            .field("pending", &self.buffer.len())
            .field("last_flush_tick", &self.last_flush_tick)
            .finish()
    }
}
