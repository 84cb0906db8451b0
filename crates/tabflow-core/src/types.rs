use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::FilterDescriptor;

/// A store-native parallel-scan partition, numbered `0..total_segments`.
pub type SegmentId = u32;

/// The unit of work dispatched to one worker: an ordered set of segments.
///
/// Invariants:
/// - `segments` is non-empty and every id is `< total_segments`
/// - a split is created once at planning time and owned by exactly one
///   worker for its whole lifetime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    pub segments: Vec<SegmentId>,
    /// Total segments in the table's partitioning scheme. A worker needs
    /// this to issue a segment scan request, so every split carries it.
    pub total_segments: u32,
    /// Approximate items covered by this split, when the table reports an
    /// item count at planning time.
    pub approximate_item_count: Option<u64>,
    /// Pushed-down row filter, carried opaquely to the scan request.
    pub filter: Option<FilterDescriptor>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitError {
    #[error("split must contain at least one segment")]
    Empty,
    #[error("segment {segment} out of range (total_segments = {total_segments})")]
    SegmentOutOfRange { segment: u32, total_segments: u32 },
}

impl Split {
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn validate(&self) -> Result<(), SplitError> {
        if self.segments.is_empty() {
            return Err(SplitError::Empty);
        }
        for &segment in &self.segments {
            if segment >= self.total_segments {
                return Err(SplitError::SegmentOutOfRange {
                    segment,
                    total_segments: self.total_segments,
                });
            }
        }
        Ok(())
    }
}

/// Table throughput billing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BillingMode {
    /// Explicit provisioned read/write capacity units.
    Provisioned,
    /// Elastic capacity; jobs plan against a configured assumed capacity.
    OnDemand,
}

/// The throughput basis for one access direction of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityDescriptor {
    pub mode: BillingMode,
    /// Provisioned units for the relevant direction; `None` for on-demand.
    pub provisioned_units: Option<u64>,
    /// Fraction of the table capacity this job may consume, in `(0, 1]`.
    pub throughput_percent: f64,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CapacityError {
    #[error("throughput percent must be in (0, 1], got {value}")]
    InvalidPercent { value: f64 },
    #[error("provisioned table reports no capacity units")]
    MissingProvisionedUnits,
}

impl CapacityDescriptor {
    /// Units/second the whole job may consume against this table, before
    /// dividing among workers.
    pub fn job_units(&self, assumed_on_demand_units: u64) -> Result<u64, CapacityError> {
        if !(self.throughput_percent > 0.0 && self.throughput_percent <= 1.0) {
            return Err(CapacityError::InvalidPercent {
                value: self.throughput_percent,
            });
        }
        let capacity = match self.mode {
            BillingMode::Provisioned => self
                .provisioned_units
                .ok_or(CapacityError::MissingProvisionedUnits)?,
            BillingMode::OnDemand => assumed_on_demand_units,
        };
        Ok((capacity as f64 * self.throughput_percent).floor() as u64)
    }
}

/// Per-role container sizes, expressed in the cluster's common slot unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerFootprints {
    pub node_slots: u32,
    pub master_slots: u32,
    pub map_slots: u32,
    pub reduce_slots: u32,
}

/// Read-only snapshot of the cluster taken at planning time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterTopology {
    pub node_count: u32,
    pub footprints: ContainerFootprints,
}
