//! Configuration for the life runtime

use std::path::PathBuf;

use anima_memory::{MaintenancePolicy, MemoryStoreConfig};
use anima_state::StateConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RuntimeError};
use crate::logs::LogManagerConfig;
use crate::weakness::WeaknessPolicy;

/// Complete runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifeConfig {
    #[serde(default)]
    pub runtime: RuntimeSettings,

    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub memory: MemorySettings,

    #[serde(default)]
    pub weakness: WeaknessPolicy,

    #[serde(default)]
    pub snapshot: SnapshotSettings,

    #[serde(default)]
    pub logs: LogSettings,

    #[serde(default)]
    pub cadence: CadenceSettings,
}

/// Loop timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    /// Sleep between ticks
    pub tick_interval_ms: u64,
    /// Simulated time per tick
    pub dt: f64,
    /// Cap on events drained per tick. `None` drains everything queued;
    /// with a cap, the rest wait for later ticks.
    pub max_events_per_tick: Option<usize>,
    /// Stop after this tick. `None` runs until stopped.
    pub max_ticks: Option<u64>,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            dt: 1.0,
            max_events_per_tick: None,
            max_ticks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    pub capacity: usize,
    pub archive_capacity: usize,
    /// Upper bound on memories activated per event
    pub activation_limit: usize,
    pub maintenance: MaintenancePolicy,
}

impl Default for MemorySettings {
    fn default() -> Self {
        let store = MemoryStoreConfig::default();
        Self {
            capacity: store.capacity,
            archive_capacity: store.archive_capacity,
            activation_limit: 8,
            maintenance: MaintenancePolicy::default(),
        }
    }
}

impl MemorySettings {
    pub fn store_config(&self) -> MemoryStoreConfig {
        MemoryStoreConfig {
            capacity: self.capacity,
            archive_capacity: self.archive_capacity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Ticks between snapshots; 0 disables periodic snapshots
    pub period: u64,
    /// Directory for file snapshots. `None` keeps them in memory.
    pub directory: Option<PathBuf>,
    /// Number of snapshots retained
    pub keep: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self {
            period: 100,
            directory: None,
            keep: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub flush_period: u64,
    pub flush_before_snapshot: bool,
    pub flush_after_snapshot: bool,
    pub flush_on_exception: bool,
    pub buffer_capacity: usize,
    /// JSON-lines file for flushed records. `None` keeps them in memory.
    pub path: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        let manager = LogManagerConfig::default();
        Self {
            flush_period: manager.flush_period,
            flush_before_snapshot: manager.flush_before_snapshot,
            flush_after_snapshot: manager.flush_after_snapshot,
            flush_on_exception: manager.flush_on_exception,
            buffer_capacity: manager.buffer_capacity,
            path: None,
        }
    }
}

impl LogSettings {
    pub fn manager_config(&self) -> LogManagerConfig {
        LogManagerConfig {
            flush_period: self.flush_period,
            flush_before_snapshot: self.flush_before_snapshot,
            flush_after_snapshot: self.flush_after_snapshot,
            flush_on_exception: self.flush_on_exception,
            buffer_capacity: self.buffer_capacity,
        }
    }
}

/// Slow cadences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadenceSettings {
    pub learning_period: u64,
    pub adaptation_period: u64,
    /// 0 disables memory maintenance
    pub maintenance_period: u64,
    /// Largest change a single learning or adaptation pass may make per key
    pub max_param_delta: f64,
}

impl Default for CadenceSettings {
    fn default() -> Self {
        Self {
            learning_period: 50,
            adaptation_period: 200,
            maintenance_period: 25,
            max_param_delta: 0.05,
        }
    }
}

impl LifeConfig {
    /// Load configuration: defaults, then the optional file, then `ANIMA_`
    /// environment variables (`ANIMA_SNAPSHOT__PERIOD=50`).
    pub fn load(path: Option<&str>) -> std::result::Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&LifeConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ANIMA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject settings the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(RuntimeError::InvalidConfig(msg));

        if !(self.runtime.dt.is_finite() && self.runtime.dt >= 0.0) {
            return invalid(format!("runtime.dt must be finite and >= 0, got {}", self.runtime.dt));
        }
        if self.runtime.max_events_per_tick == Some(0) {
            return invalid("runtime.max_events_per_tick must be > 0".to_string());
        }
        if self.state.audit_capacity == 0 {
            return invalid("state.audit_capacity must be > 0".to_string());
        }
        if self.memory.capacity == 0 || self.memory.archive_capacity == 0 {
            return invalid("memory capacities must be > 0".to_string());
        }
        self.memory
            .maintenance
            .validate()
            .map_err(|e| RuntimeError::InvalidConfig(e.to_string()))?;

        let weakness = &self.weakness;
        if !(0.0..=1.0).contains(&weakness.threshold) {
            return invalid(format!("weakness.threshold must be in [0, 1], got {}", weakness.threshold));
        }
        if !(weakness.base_rate.is_finite() && weakness.base_rate >= 0.0) {
            return invalid(format!("weakness.base_rate must be >= 0, got {}", weakness.base_rate));
        }
        if !(weakness.stability_multiplier >= 1.0 && weakness.integrity_multiplier >= 1.0) {
            return invalid("weakness multipliers must be >= 1".to_string());
        }

        if self.logs.flush_period == 0 {
            return invalid("logs.flush_period must be > 0".to_string());
        }
        if self.logs.buffer_capacity == 0 {
            return invalid("logs.buffer_capacity must be > 0".to_string());
        }
        if self.snapshot.keep == 0 {
            return invalid("snapshot.keep must be > 0".to_string());
        }

        let cadence = &self.cadence;
        if cadence.learning_period <= 1 {
            return invalid(format!(
                "cadence.learning_period must be > 1, got {}",
                cadence.learning_period
            ));
        }
        if cadence.adaptation_period <= cadence.learning_period {
            return invalid(format!(
                "cadence.adaptation_period ({}) must exceed learning_period ({})",
                cadence.adaptation_period, cadence.learning_period
            ));
        }
        if !(cadence.max_param_delta > 0.0 && cadence.max_param_delta <= 1.0) {
            return invalid(format!(
                "cadence.max_param_delta must be in (0, 1], got {}",
                cadence.max_param_delta
            ));
        }
        Ok(())
    }
}
