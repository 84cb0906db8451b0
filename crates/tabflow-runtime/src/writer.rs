use std::collections::VecDeque;
use std::sync::Arc;

use thiserror::Error;

use tabflow_observe::metrics::ScopedTimer;

use crate::metrics::WorkerMetrics;
use crate::rate::RateController;
use crate::store::{StoreError, TableClient, WriteRequest};
use crate::throughput::ThroughputError;

/// Most items the store accepts in one batch write call.
pub const MAX_BATCH_ITEMS: usize = 25;

#[derive(Debug, Error)]
pub enum WriteError {
    /// The caller must supply at least the key attributes; an attribute-less
    /// record is a programming error, not a store condition.
    #[error("record has no attributes; at least the key attributes are required")]
    EmptyRecord,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Throughput(#[from] ThroughputError),
}

/// Batched write path for one worker.
///
/// Records queue until a full batch is ready, then go to the store under
/// the rate controller's budget. Items the store reports as unprocessed
/// are re-queued and submitted, alone, as the next outgoing batch; they
/// count as completed only once the store accepts them.
pub struct BatchWriter {
    client: Arc<dyn TableClient>,
    table: String,
    controller: RateController,
    metrics: Arc<WorkerMetrics>,
    pending: VecDeque<WriteRequest>,
    retry: VecDeque<WriteRequest>,
}

impl BatchWriter {
    pub fn new(
        client: Arc<dyn TableClient>,
        table: String,
        controller: RateController,
        metrics: Arc<WorkerMetrics>,
    ) -> Self {
        Self {
            client,
            table,
            controller,
            metrics,
            pending: VecDeque::new(),
            retry: VecDeque::new(),
        }
    }

    /// Queue one record, submitting batches as they fill.
    pub fn write(&mut self, request: WriteRequest) -> Result<(), WriteError> {
        if request.attributes().is_empty() {
            return Err(WriteError::EmptyRecord);
        }
        self.pending.push_back(request);
        while self.retry.len() + self.pending.len() >= MAX_BATCH_ITEMS {
            self.submit_next_batch()?;
        }
        Ok(())
    }

    /// Drain every queued record, including retries, to the store.
    ///
    /// A store that keeps rejecting items shows up as reduced throughput
    /// here, not as an error; the rate controller paces the retries.
    pub fn flush(&mut self) -> Result<(), WriteError> {
        while !self.retry.is_empty() || !self.pending.is_empty() {
            self.submit_next_batch()?;
        }
        Ok(())
    }

    /// Records queued but not yet accepted by the store.
    pub fn queued_len(&self) -> usize {
        self.retry.len() + self.pending.len()
    }

    fn submit_next_batch(&mut self) -> Result<(), WriteError> {
        self.controller.throttle()?;

        // Retries go out alone so a rejected item is the next thing the
        // store sees, not the tail of a fresh batch.
        let batch: Vec<WriteRequest> = if self.retry.is_empty() {
            let take = self.pending.len().min(MAX_BATCH_ITEMS);
            self.pending.drain(..take).collect()
        } else {
            let take = self.retry.len().min(MAX_BATCH_ITEMS);
            self.retry.drain(..take).collect()
        };
        if batch.is_empty() {
            return Ok(());
        }

        let submitted = batch.len() as u64;
        let output = {
            let metrics = Arc::clone(&self.metrics);
            let _timer = ScopedTimer::new(&metrics.batch_submit_latency);
            self.client.batch_write(&self.table, batch)?
        };

        let unprocessed = output.unprocessed.len() as u64;
        let accepted = submitted.saturating_sub(unprocessed);
        if unprocessed > 0 {
            tracing::debug!(
                target: "tabflow",
                table = %self.table,
                unprocessed,
                "store returned unprocessed items; re-queued for retry"
            );
            self.metrics.unprocessed_total.inc_by(unprocessed);
            self.retry.extend(output.unprocessed);
        }

        self.metrics.items_written_total.inc_by(accepted);
        self.controller.record(accepted, output.consumed_capacity_units);
        Ok(())
    }
}
