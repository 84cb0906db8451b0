use thiserror::Error;

use tabflow_core::filter::FilterDescriptor;
use tabflow_core::types::{SegmentId, Split};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SplitPlanError {
    #[error("num_workers must be >= 1")]
    ZeroWorkers,
    #[error("total_segments must be >= 1")]
    ZeroSegments,
}

/// Partition `0..total_segments` into one split per worker.
///
/// The effective worker count is `min(num_workers, total_segments)`; no
/// split is ever empty. Assignment is contiguous by rank: rank `r` takes
/// the next run of segment ids, with the first `total_segments % workers`
/// ranks taking one segment more than the rest. The same inputs always
/// produce the same partition. Consumers must not rely on the assignment
/// order beyond the balance guarantee.
pub fn generate_splits(num_workers: u32, total_segments: u32) -> Result<Vec<Split>, SplitPlanError> {
    if num_workers == 0 {
        return Err(SplitPlanError::ZeroWorkers);
    }
    if total_segments == 0 {
        return Err(SplitPlanError::ZeroSegments);
    }

    let workers = num_workers.min(total_segments);
    let base = total_segments / workers;
    let extra = total_segments % workers;

    let mut splits = Vec::with_capacity(workers as usize);
    let mut next: SegmentId = 0;
    for rank in 0..workers {
        let take = if rank < extra { base + 1 } else { base };
        let segments: Vec<SegmentId> = (next..next + take).collect();
        next += take;
        splits.push(Split {
            segments,
            total_segments,
            approximate_item_count: None,
            filter: None,
        });
    }
    Ok(splits)
}

/// Attach planning hints to a generated split set: the per-split share of
/// the table's approximate item count, and the job's pushed-down filter.
pub fn annotate_splits(
    splits: &mut [Split],
    table_item_count: Option<u64>,
    filter: Option<&FilterDescriptor>,
) {
    let per_split_items = table_item_count.map(|count| count / splits.len().max(1) as u64);
    for split in splits.iter_mut() {
        split.approximate_item_count = per_split_items;
        split.filter = filter.cloned();
    }
}
