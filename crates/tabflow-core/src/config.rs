use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shim::EngineKind;

/// Fraction of table capacity a job consumes unless configured otherwise.
pub const DEFAULT_THROUGHPUT_PERCENT: f64 = 0.5;

/// Capacity assumed for on-demand tables, which report no provisioned
/// units to plan against.
pub const DEFAULT_ON_DEMAND_ASSUMED_UNITS: u64 = 40_000;

/// Recognized configuration surface for one table-access job.
///
/// Memory sizes are in MB; the planner derives the common slot unit from
/// them. `configured_worker_count` comes from the job framework and caps
/// whatever the cluster-derived concurrency figure allows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub table_name: String,
    pub read_throughput_percent: f64,
    pub write_throughput_percent: f64,
    pub on_demand_assumed_units: u64,
    pub node_memory_mb: u64,
    pub master_memory_mb: u64,
    pub map_memory_mb: u64,
    pub reduce_memory_mb: u64,
    /// Reduce containers the job framework has already committed to the
    /// cluster.
    pub reducer_count: u32,
    pub configured_worker_count: u32,
    /// Concurrency figure used when cluster status cannot be retrieved.
    pub fallback_max_workers: u32,
    pub engine: EngineKind,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            table_name: String::new(),
            read_throughput_percent: DEFAULT_THROUGHPUT_PERCENT,
            write_throughput_percent: DEFAULT_THROUGHPUT_PERCENT,
            on_demand_assumed_units: DEFAULT_ON_DEMAND_ASSUMED_UNITS,
            node_memory_mb: 8192,
            master_memory_mb: 2048,
            map_memory_mb: 4096,
            reduce_memory_mb: 2048,
            reducer_count: 0,
            configured_worker_count: 1,
            fallback_max_workers: 1,
            engine: EngineKind::default(),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("table name must be non-empty")]
    MissingTableName,
    #[error("{field} must be in (0, 1], got {value}")]
    InvalidPercent { field: &'static str, value: f64 },
    #[error("{field} must be non-zero")]
    ZeroMemory { field: &'static str },
    #[error("on-demand assumed capacity must be non-zero")]
    ZeroAssumedCapacity,
    #[error("configured worker count must be non-zero")]
    ZeroWorkerCount,
}

impl JobConfig {
    /// Configuration errors are fatal: the job must not start on an
    /// invalid surface.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table_name.trim().is_empty() {
            return Err(ConfigError::MissingTableName);
        }
        for (field, value) in [
            ("read_throughput_percent", self.read_throughput_percent),
            ("write_throughput_percent", self.write_throughput_percent),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::InvalidPercent { field, value });
            }
        }
        if self.on_demand_assumed_units == 0 {
            return Err(ConfigError::ZeroAssumedCapacity);
        }
        for (field, value) in [
            ("node_memory_mb", self.node_memory_mb),
            ("master_memory_mb", self.master_memory_mb),
            ("map_memory_mb", self.map_memory_mb),
            ("reduce_memory_mb", self.reduce_memory_mb),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroMemory { field });
            }
        }
        if self.configured_worker_count == 0 {
            return Err(ConfigError::ZeroWorkerCount);
        }
        Ok(())
    }
}
