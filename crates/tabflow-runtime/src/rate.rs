use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics::WorkerMetrics;
use crate::throughput::{BudgetSource, ThroughputError};

/// Nominal measurement interval for the per-worker budget.
pub const RATE_INTERVAL: Duration = Duration::from_secs(1);

/// Time source for the controller. Production uses the blocking system
/// clock; tests inject a fake so throttling is observable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Per-worker adaptive admission control.
///
/// Two logical states: admitting (requests proceed without blocking) and
/// throttled (the worker blocks until the current interval has fully
/// elapsed). When an interval's completed items reach the budget, the
/// controller re-derives the budget from the source target and the
/// interval's achieved items-per-unit ratio, sleeps out the remainder of
/// the interval, resets its accumulators, and admits again.
///
/// Purely local: workers never coordinate; the aggregate table target is
/// met statistically as each worker limits itself to its own share. The
/// budget is re-derived from scratch each interval rather than smoothed.
pub struct RateController {
    source: Box<dyn BudgetSource>,
    clock: Box<dyn Clock>,
    metrics: Arc<WorkerMetrics>,
    budget_items: u64,
    interval_start: Instant,
    items_this_interval: u64,
    units_this_interval: f64,
}

impl RateController {
    /// Fails when no initial target can be derived; a worker must not
    /// start without a throughput basis.
    pub fn new(
        source: Box<dyn BudgetSource>,
        clock: Box<dyn Clock>,
        metrics: Arc<WorkerMetrics>,
    ) -> Result<Self, ThroughputError> {
        let budget_items = source.target_units_per_second()?.max(1);
        metrics.budget_items_per_second.set(budget_items);
        let interval_start = clock.now();
        Ok(Self {
            source,
            clock,
            metrics,
            budget_items,
            interval_start,
            items_this_interval: 0,
            units_this_interval: 0.0,
        })
    }

    pub fn budget_items_per_second(&self) -> u64 {
        self.budget_items
    }

    /// Record one completed batch: items the store accepted and the
    /// capacity it reported consuming.
    pub fn record(&mut self, items: u64, consumed_units: f64) {
        self.items_this_interval += items;
        self.units_this_interval += consumed_units;
    }

    /// Enforce the budget. Returns immediately while admitting; once this
    /// interval's completions reach the budget, revises the budget and
    /// blocks out the rest of the interval.
    pub fn throttle(&mut self) -> Result<(), ThroughputError> {
        if self.items_this_interval < self.budget_items {
            return Ok(());
        }
        self.revise_budget()?;

        let elapsed = self.clock.now().duration_since(self.interval_start);
        if elapsed < RATE_INTERVAL {
            self.metrics.throttle_sleeps_total.inc();
            self.clock.sleep(RATE_INTERVAL - elapsed);
        }

        self.interval_start = self.clock.now();
        self.items_this_interval = 0;
        self.units_this_interval = 0.0;
        Ok(())
    }

    /// Re-derive the item budget: fresh units/second target, scaled by the
    /// interval's achieved items-per-unit ratio. Reacts to concurrency or
    /// capacity changes mid-job without smoothing against the old budget.
    fn revise_budget(&mut self) -> Result<(), ThroughputError> {
        let target_units = self.source.target_units_per_second()?;
        let items = self.items_this_interval;
        let units = self.units_this_interval;

        let units_per_item = if items == 0 || units <= 0.0 {
            1.0
        } else {
            units / items as f64
        };
        let next = (target_units as f64 / units_per_item).floor() as u64;
        let next = next.max(1);

        if next != self.budget_items {
            tracing::debug!(
                target: "tabflow",
                previous = self.budget_items,
                next,
                items,
                consumed_units = units,
                "revised worker budget"
            );
        }
        self.budget_items = next;
        self.metrics.budget_items_per_second.set(next);
        Ok(())
    }
}
