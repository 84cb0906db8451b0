use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic event counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Last-value gauge.
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Count/total/max aggregate over recorded durations.
#[derive(Debug, Default)]
pub struct DurationAgg {
    count: AtomicU64,
    total_ns: AtomicU64,
    max_ns: AtomicU64,
}

impl DurationAgg {
    pub fn record(&self, dur: Duration) {
        let ns = dur.as_nanos().min(u64::MAX as u128) as u64;
        self.count.fetch_add(1, Ordering::Relaxed);
        self.total_ns.fetch_add(ns, Ordering::Relaxed);

        let mut prev = self.max_ns.load(Ordering::Relaxed);
        while ns > prev {
            match self
                .max_ns
                .compare_exchange_weak(prev, ns, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(next) => prev = next,
            }
        }
    }

    pub fn snapshot(&self) -> DurationAggSnapshot {
        DurationAggSnapshot {
            count: self.count.load(Ordering::Relaxed),
            total_ns: self.total_ns.load(Ordering::Relaxed),
            max_ns: self.max_ns.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DurationAggSnapshot {
    pub count: u64,
    pub total_ns: u64,
    pub max_ns: u64,
}

impl DurationAggSnapshot {
    pub fn avg_ns(&self) -> u64 {
        if self.count == 0 {
            0
        } else {
            self.total_ns / self.count
        }
    }
}

/// Records the elapsed time into a `DurationAgg` when dropped.
pub struct ScopedTimer<'a> {
    start: Instant,
    agg: &'a DurationAgg,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(agg: &'a DurationAgg) -> Self {
        Self {
            start: Instant::now(),
            agg,
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        self.agg.record(self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let c = Counter::default();
        c.inc();
        c.inc_by(4);
        assert_eq!(c.get(), 5);
    }

    #[test]
    fn duration_agg_tracks_count_and_max() {
        let agg = DurationAgg::default();
        agg.record(Duration::from_millis(2));
        agg.record(Duration::from_millis(8));
        let snap = agg.snapshot();
        assert_eq!(snap.count, 2);
        assert!(snap.max_ns >= 8_000_000);
        assert!(snap.avg_ns() >= 2_000_000);
    }
}
