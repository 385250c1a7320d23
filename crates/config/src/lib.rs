//! Configuration schema and loader for the janus demo driver.
//!
//! The storage library itself takes no configuration; this covers the
//! demo binary only (metrics endpoint and workload shape).

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Top-level demo configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Optional Prometheus metrics listen address.
    #[serde(default)]
    pub metrics_listen: Option<SocketAddr>,

    /// Workload shape for the metrics simulation.
    #[serde(default)]
    pub workload: WorkloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Concurrent writer tasks.
    #[serde(default = "default_writers")]
    pub writers: usize,

    /// Concurrent reader tasks.
    #[serde(default = "default_readers")]
    pub readers: usize,

    /// Operations performed by each task.
    #[serde(default = "default_ops_per_task")]
    pub ops_per_task: usize,

    /// Distinct keys the workload spreads operations across.
    #[serde(default = "default_key_space")]
    pub key_space: usize,

    /// Per-operation think time in milliseconds.
    #[serde(default = "default_think_time_ms")]
    pub think_time_ms: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            writers: default_writers(),
            readers: default_readers(),
            ops_per_task: default_ops_per_task(),
            key_space: default_key_space(),
            think_time_ms: default_think_time_ms(),
        }
    }
}

// --- Defaults ---

fn default_writers() -> usize {
    2
}
fn default_readers() -> usize {
    2
}
fn default_ops_per_task() -> usize {
    50
}
fn default_key_space() -> usize {
    8
}
fn default_think_time_ms() -> u64 {
    1
}

// --- Loading ---

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl DemoConfig {
    /// Validate that configuration values are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workload.writers == 0 && self.workload.readers == 0 {
            return Err(ConfigError::Invalid(
                "workload needs at least one writer or reader task".into(),
            ));
        }
        if self.workload.ops_per_task == 0 {
            return Err(ConfigError::Invalid(
                "workload.ops_per_task must be > 0".into(),
            ));
        }
        if self.workload.key_space == 0 {
            return Err(ConfigError::Invalid(
                "workload.key_space must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Load a `DemoConfig` from a YAML file path.
pub fn load_from_file(path: &std::path::Path) -> Result<DemoConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: DemoConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

/// Load a `DemoConfig` from a YAML string.
pub fn load_from_str(yaml: &str) -> Result<DemoConfig, ConfigError> {
    let config: DemoConfig = serde_yaml::from_str(yaml)?;
    config.validate()?;
    Ok(config)
}
