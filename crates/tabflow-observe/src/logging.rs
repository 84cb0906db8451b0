use tracing_subscriber::EnvFilter;

/// Initializes a `tracing_subscriber` using `TABFLOW_LOG` first, then `RUST_LOG`, then a default.
///
/// Log field contract for tabflow components:
/// - Always include `table` on any event touching a specific table.
/// - Include `worker` (the worker's rank) on worker-path events.
/// - Include `segment` on scan events.
/// - Throttle events include the interval's `items` and `consumed_units`.
pub fn init_tracing() {
    let filter = env_filter();
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env("TABFLOW_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
