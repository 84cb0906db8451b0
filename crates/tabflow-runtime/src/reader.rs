use std::sync::Arc;

use thiserror::Error;

use tabflow_core::attr::Item;
use tabflow_core::types::{Split, SplitError};

use crate::metrics::WorkerMetrics;
use crate::rate::RateController;
use crate::store::{ScanRequest, StoreError, TableClient};
use crate::throughput::ThroughputError;

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Split(#[from] SplitError),
    /// Fatal for this worker's split: segments are too coarse to retry a
    /// sub-range at this layer.
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Throughput(#[from] ThroughputError),
}

/// Read path for one worker: scans the split's segments in order, one page
/// at a time, reporting each page's consumption to the rate controller.
pub struct SegmentScanner {
    client: Arc<dyn TableClient>,
    table: String,
    split: Split,
    controller: RateController,
    metrics: Arc<WorkerMetrics>,
    page_limit: Option<u32>,
    position: usize,
    next_key: Option<Item>,
    done: bool,
}

impl SegmentScanner {
    pub fn new(
        client: Arc<dyn TableClient>,
        table: String,
        split: Split,
        controller: RateController,
        metrics: Arc<WorkerMetrics>,
    ) -> Result<Self, ReadError> {
        split.validate()?;
        Ok(Self {
            client,
            table,
            split,
            controller,
            metrics,
            page_limit: None,
            position: 0,
            next_key: None,
            done: false,
        })
    }

    /// Cap on items per scan page; `None` lets the store pick.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Next page of items, or `None` once every segment is exhausted. An
    /// empty page is not the end; callers keep polling until `None`.
    pub fn next_page(&mut self) -> Result<Option<Vec<Item>>, ReadError> {
        if self.done {
            return Ok(None);
        }
        let Some(&segment) = self.split.segments.get(self.position) else {
            self.done = true;
            return Ok(None);
        };

        self.controller.throttle()?;

        let request = ScanRequest {
            table: self.table.clone(),
            segment,
            total_segments: self.split.total_segments,
            exclusive_start_key: self.next_key.take(),
            limit: self.page_limit,
            filter: self.split.filter.clone(),
        };
        let page = self.client.scan_segment(&request)?;

        self.metrics.pages_scanned_total.inc();
        self.metrics.items_scanned_total.inc_by(page.items.len() as u64);
        self.controller
            .record(page.items.len() as u64, page.consumed_capacity_units);

        match page.last_evaluated_key {
            Some(key) => self.next_key = Some(key),
            None => {
                tracing::debug!(
                    target: "tabflow",
                    table = %self.table,
                    segment,
                    "segment exhausted"
                );
                self.position += 1;
                if self.position == self.split.segments.len() {
                    self.done = true;
                }
            }
        }
        Ok(Some(page.items))
    }

    /// Drain the remaining pages into one buffer.
    pub fn collect_remaining(&mut self) -> Result<Vec<Item>, ReadError> {
        let mut items = Vec::new();
        while let Some(page) = self.next_page()? {
            items.extend(page);
        }
        Ok(items)
    }
}
