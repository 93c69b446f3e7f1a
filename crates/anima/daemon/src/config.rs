//! Configuration for animad

use anima_policies::PolicyConfig;
use anima_runtime::LifeConfig;
use serde::{Deserialize, Serialize};

/// Everything the daemon reads from file and environment. The life sections
/// sit at the top level (`[runtime]`, `[snapshot]`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(flatten)]
    pub life: LifeConfig,

    #[serde(default)]
    pub policies: PolicyConfig,

    #[serde(default)]
    pub daemon: DaemonSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Seconds between status log lines.
    pub status_interval_secs: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            status_interval_secs: 10,
        }
    }
}

impl DaemonConfig {
    /// Load configuration from file and environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Start with defaults
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add config file if specified
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        // Add environment variables (ANIMA_RUNTIME__DT=0.5, ANIMA_DAEMON__STATUS_INTERVAL_SECS=5)
        builder = builder.add_source(
            config::Environment::with_prefix("ANIMA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
