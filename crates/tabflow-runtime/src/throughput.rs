use std::sync::Arc;

use thiserror::Error;

use tabflow_core::config::JobConfig;
use tabflow_core::types::{CapacityDescriptor, CapacityError};

use crate::store::{DescribeTable, StoreError};

/// Which capacity column of the table description a job draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

#[derive(Debug, Error)]
pub enum ThroughputError {
    /// The job cannot safely proceed without a throughput basis.
    #[error("table description unavailable: {0}")]
    Describe(#[from] StoreError),
    #[error(transparent)]
    Capacity(#[from] CapacityError),
}

/// Source of the per-worker units/second target. The rate controller
/// re-queries this once per interval, so a target can move mid-job.
pub trait BudgetSource: Send {
    fn target_units_per_second(&self) -> Result<u64, ThroughputError>;
}

/// Converts the table's aggregate throughput budget into one worker's
/// initial per-second request budget.
pub struct ThroughputCalculator {
    client: Arc<dyn DescribeTable>,
    table: String,
    kind: AccessKind,
    throughput_percent: f64,
    assumed_on_demand_units: u64,
    max_workers: u32,
}

impl ThroughputCalculator {
    /// `planned_workers` is the concurrency planner's figure; the job
    /// framework's configured worker count caps it.
    pub fn new(
        client: Arc<dyn DescribeTable>,
        kind: AccessKind,
        config: &JobConfig,
        planned_workers: u32,
    ) -> Self {
        let throughput_percent = match kind {
            AccessKind::Read => config.read_throughput_percent,
            AccessKind::Write => config.write_throughput_percent,
        };
        Self {
            client,
            table: config.table_name.clone(),
            kind,
            throughput_percent,
            assumed_on_demand_units: config.on_demand_assumed_units,
            max_workers: planned_workers.min(config.configured_worker_count),
        }
    }

    /// Units/second one worker may consume right now. Never zero.
    pub fn target_units_per_worker(&self) -> Result<u64, ThroughputError> {
        let description = self.client.describe_table(&self.table)?;
        let provisioned_units = match self.kind {
            AccessKind::Read => description.read_capacity_units,
            AccessKind::Write => description.write_capacity_units,
        };
        let capacity = CapacityDescriptor {
            mode: description.billing_mode,
            provisioned_units,
            throughput_percent: self.throughput_percent,
        };
        let job_units = capacity.job_units(self.assumed_on_demand_units)?;
        Ok((job_units / u64::from(self.max_workers.max(1))).max(1))
    }
}

impl BudgetSource for ThroughputCalculator {
    fn target_units_per_second(&self) -> Result<u64, ThroughputError> {
        self.target_units_per_worker()
    }
}
