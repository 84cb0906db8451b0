use tabflow_observe::metrics::{Counter, DurationAgg, Gauge};

/// Per-worker counters for the read/write paths.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    pub items_written_total: Counter,
    pub items_scanned_total: Counter,
    pub pages_scanned_total: Counter,
    pub unprocessed_total: Counter,
    pub throttle_sleeps_total: Counter,
    pub budget_items_per_second: Gauge,
    pub batch_submit_latency: DurationAgg,
}

impl WorkerMetrics {
    /// Emit a one-line metrics snapshot, for periodic logging.
    pub fn emit_snapshot(&self, worker: u32) {
        let latency = self.batch_submit_latency.snapshot();
        tracing::info!(
            target: "tabflow_metrics",
            worker,
            items_written_total = self.items_written_total.get(),
            items_scanned_total = self.items_scanned_total.get(),
            pages_scanned_total = self.pages_scanned_total.get(),
            unprocessed_total = self.unprocessed_total.get(),
            throttle_sleeps_total = self.throttle_sleeps_total.get(),
            budget_items_per_second = self.budget_items_per_second.get(),
            batch_submit_avg_ns = latency.avg_ns(),
            batch_submit_max_ns = latency.max_ns,
            "metrics"
        );
    }
}
