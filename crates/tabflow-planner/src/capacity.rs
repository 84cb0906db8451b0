use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Live scheduler configuration, as exposed by the cluster manager.
///
/// External collaborator: implementations wrap whatever API the resource
/// manager offers. This system only needs two figures from it.
pub trait SchedulerInfo: Send + Sync + 'static {
    fn node_count(&self) -> Result<u32, CapacityError>;
    fn node_memory_mb(&self) -> Result<u64, CapacityError>;
}

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error("cluster status unavailable: {0}")]
    Unavailable(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid cluster description: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Static cluster-description document, the fallback when live scheduler
/// configuration cannot be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDescription {
    pub node_count: u32,
    pub node_memory_mb: u64,
}

impl ClusterDescription {
    pub fn from_file(path: &Path) -> Result<Self, CapacityError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Usable-cluster snapshot handed to the concurrency planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterStatus {
    pub node_count: u32,
    pub node_memory_mb: u64,
}

/// Reports per-node usable memory and node count for the cluster,
/// preferring the live scheduler configuration and falling back to a
/// static description document when the live source fails.
pub struct ClusterCapacityProvider {
    scheduler: Option<Arc<dyn SchedulerInfo>>,
    fallback: Option<ClusterDescription>,
}

impl ClusterCapacityProvider {
    pub fn new(
        scheduler: Option<Arc<dyn SchedulerInfo>>,
        fallback: Option<ClusterDescription>,
    ) -> Self {
        Self {
            scheduler,
            fallback,
        }
    }

    pub fn from_scheduler(scheduler: Arc<dyn SchedulerInfo>) -> Self {
        Self::new(Some(scheduler), None)
    }

    pub fn from_description(description: ClusterDescription) -> Self {
        Self::new(None, Some(description))
    }

    pub fn status(&self) -> Result<ClusterStatus, CapacityError> {
        if let Some(scheduler) = &self.scheduler {
            match Self::live_status(scheduler.as_ref()) {
                Ok(status) => return Ok(status),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        "live scheduler configuration unavailable; trying static cluster description"
                    );
                }
            }
        }
        if let Some(description) = &self.fallback {
            return Ok(ClusterStatus {
                node_count: description.node_count,
                node_memory_mb: description.node_memory_mb,
            });
        }
        Err(CapacityError::Unavailable(
            "no live scheduler source and no static cluster description".to_string(),
        ))
    }

    fn live_status(scheduler: &dyn SchedulerInfo) -> Result<ClusterStatus, CapacityError> {
        Ok(ClusterStatus {
            node_count: scheduler.node_count()?,
            node_memory_mb: scheduler.node_memory_mb()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
            Err(CapacityError::Unavailable("connection refused".to_string()))
        }

        fn node_memory_mb(&self) -> Result<u64, CapacityError> {
            Err(CapacityError::Unavailable("connection refused".to_string()))
        }
    }

    #[test]
    fn live_source_is_preferred() {
        let provider = ClusterCapacityProvider::new(
            Some(Arc::new(FixedScheduler {
                nodes: 4,
                memory_mb: 8192,
            })),
            Some(ClusterDescription {
                node_count: 1,
                node_memory_mb: 1024,
            }),
        );
        let status = provider.status().unwrap();
        assert_eq!(status.node_count, 4);
        assert_eq!(status.node_memory_mb, 8192);
    }

    #[test]
    fn broken_live_source_falls_back_to_description() {
        let provider = ClusterCapacityProvider::new(
            Some(Arc::new(BrokenScheduler)),
            Some(ClusterDescription {
                node_count: 2,
                node_memory_mb: 4096,
            }),
        );
        let status = provider.status().unwrap();
        assert_eq!(status.node_count, 2);
        assert_eq!(status.node_memory_mb, 4096);
    }

    #[test]
    fn no_source_at_all_is_an_error() {
        let provider = ClusterCapacityProvider::new(None, None);
        assert!(matches!(
            provider.status(),
            Err(CapacityError::Unavailable(_))
        ));
    }
}
