use tabflow_core::config::JobConfig;
use tabflow_core::types::{ClusterTopology, ContainerFootprints};

use crate::capacity::{CapacityError, ClusterCapacityProvider, ClusterStatus};
use crate::slots::max_additional_mappers;

/// Derives the job's max concurrent worker figure from cluster topology
/// and container-sized memory accounting.
pub struct ConcurrencyPlanner {
    provider: ClusterCapacityProvider,
    config: JobConfig,
}

impl ConcurrencyPlanner {
    pub fn new(provider: ClusterCapacityProvider, config: JobConfig) -> Self {
        Self { provider, config }
    }

    /// Max workers this job can run concurrently.
    ///
    /// Fails closed: when cluster status cannot be retrieved the job is not
    /// aborted; the statically configured figure is used instead.
    pub fn max_workers(&self) -> u32 {
        match self.plan_from_cluster() {
            Ok(workers) => workers,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    fallback = self.config.fallback_max_workers,
                    "cluster status unavailable; using configured worker fallback"
                );
                self.config.fallback_max_workers
            }
        }
    }

    fn plan_from_cluster(&self) -> Result<u32, CapacityError> {
        let status = self.provider.status()?;
        let topology = self.topology(status);
        tracing::debug!(
            node_count = topology.node_count,
            node_slots = topology.footprints.node_slots,
            map_slots = topology.footprints.map_slots,
            "derived cluster topology"
        );
        Ok(max_additional_mappers(
            topology.node_count,
            self.config.reducer_count,
            topology.footprints,
        ))
    }

    /// Convert configured memory sizes into slot counts. The slot unit is
    /// the gcd of all sizes, so containers always measure a whole number
    /// of slots; when the smallest size divides the others, it is the unit.
    fn topology(&self, status: ClusterStatus) -> ClusterTopology {
        let unit = slot_unit_mb(&[
            status.node_memory_mb,
            self.config.master_memory_mb,
            self.config.map_memory_mb,
            self.config.reduce_memory_mb,
        ]);
        ClusterTopology {
            node_count: status.node_count,
            footprints: ContainerFootprints {
                node_slots: slots_of(status.node_memory_mb, unit),
                master_slots: slots_of(self.config.master_memory_mb, unit),
                map_slots: slots_of(self.config.map_memory_mb, unit),
                reduce_slots: slots_of(self.config.reduce_memory_mb, unit),
            },
        }
    }
}

fn slots_of(memory_mb: u64, unit_mb: u64) -> u32 {
    if unit_mb == 0 {
        return 0;
    }
    u32::try_from(memory_mb / unit_mb).unwrap_or(u32::MAX)
}

fn slot_unit_mb(sizes: &[u64]) -> u64 {
    sizes.iter().copied().fold(0, gcd)
}

fn gcd(a: u64, b: u64) -> u64 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::capacity::{ClusterDescription, SchedulerInfo};

    struct FixedScheduler {
        nodes: u32,
        memory_mb: u64,
    }

    impl SchedulerInfo for FixedScheduler {
        fn node_count(&self) -> Result<u32, CapacityError> {
            Ok(self.nodes)
        }

        fn node_memory_mb(&self) -> Result<u64, CapacityError> {
            Ok(self.memory_mb)
        }
    }

    struct BrokenScheduler;

    impl SchedulerInfo for BrokenScheduler {
        fn node_count(&self) -> Result<u32, CapacityError> {
            Err(CapacityError::Unavailable("timed out".to_string()))
        }

        fn node_memory_mb(&self) -> Result<u64, CapacityError> {
            Err(CapacityError::Unavailable("timed out".to_string()))
        }
    }

    fn config() -> JobConfig {
        JobConfig {
            table_name: "events".to_string(),
            reducer_count: 1,
            fallback_max_workers: 7,
            ..JobConfig::default()
        }
    }

    #[test]
    fn gcd_slot_unit() {
        assert_eq!(slot_unit_mb(&[8192, 2048, 4096, 2048]), 2048);
        assert_eq!(slot_unit_mb(&[6144, 2048, 4096, 2048]), 2048);
        assert_eq!(slot_unit_mb(&[9000, 3000, 4500, 1500]), 1500);
    }

    #[test]
    fn live_cluster_drives_worker_count() {
        // 8192/2048/4096/2048 MB -> 8/2/4/2 slots; 3 nodes, 1 reducer -> 4.
        let provider = ClusterCapacityProvider::from_scheduler(Arc::new(FixedScheduler {
            nodes: 3,
            memory_mb: 8192,
        }));
        let planner = ConcurrencyPlanner::new(provider, config());
        assert_eq!(planner.max_workers(), 4);
    }

    #[test]
    fn static_description_drives_worker_count_when_live_fails() {
        let provider = ClusterCapacityProvider::new(
            Some(Arc::new(BrokenScheduler)),
            Some(ClusterDescription {
                node_count: 2,
                node_memory_mb: 8192,
            }),
        );
        let planner = ConcurrencyPlanner::new(provider, config());
        assert_eq!(planner.max_workers(), 2);
    }

    #[test]
    fn unretrievable_status_falls_back_to_configured_figure() {
        let provider = ClusterCapacityProvider::new(Some(Arc::new(BrokenScheduler)), None);
        let planner = ConcurrencyPlanner::new(provider, config());
        assert_eq!(planner.max_workers(), 7);
    }
}
