#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use tracing::info;

use tabflow_core::config::JobConfig;
use tabflow_core::types::BillingMode;
use tabflow_planner::capacity::{ClusterCapacityProvider, ClusterDescription};
use tabflow_planner::concurrency::ConcurrencyPlanner;
use tabflow_planner::splits::{annotate_splits, generate_splits};
use tabflow_runtime::store::{DescribeTable, StoreError, TableDescription};
use tabflow_runtime::throughput::{AccessKind, ThroughputCalculator};

#[derive(Debug, Parser)]
#[command(name = "tabflow-plan")]
struct Args {
    /// Table to plan against.
    #[arg(long, env = "TABFLOW_TABLE")]
    table: String,

    /// Total scan segments the table is partitioned into.
    #[arg(long, env = "TABFLOW_TOTAL_SEGMENTS", default_value_t = 16)]
    total_segments: u32,

    /// Worker count requested by the job framework.
    #[arg(long, env = "TABFLOW_WORKERS", default_value_t = 8)]
    workers: u32,

    /// Reduce containers already committed to the cluster.
    #[arg(long, env = "TABFLOW_REDUCERS", default_value_t = 0)]
    reducers: u32,

    /// Provisioned read capacity units. Omit both unit flags for an
    /// on-demand table.
    #[arg(long, env = "TABFLOW_READ_UNITS")]
    read_units: Option<u64>,

    /// Provisioned write capacity units.
    #[arg(long, env = "TABFLOW_WRITE_UNITS")]
    write_units: Option<u64>,

    #[arg(long, env = "TABFLOW_READ_PERCENT", default_value_t = 0.5)]
    read_percent: f64,

    #[arg(long, env = "TABFLOW_WRITE_PERCENT", default_value_t = 0.5)]
    write_percent: f64,

    /// Capacity assumed for on-demand tables.
    #[arg(long, env = "TABFLOW_ON_DEMAND_ASSUMED_UNITS", default_value_t = 40_000)]
    on_demand_assumed_units: u64,

    /// Node count, when planning without a live scheduler.
    #[arg(long, env = "TABFLOW_NODES")]
    nodes: Option<u32>,

    /// Static cluster-description JSON file, used instead of `--nodes`.
    #[arg(long, env = "TABFLOW_CLUSTER_FILE")]
    cluster_file: Option<PathBuf>,

    #[arg(long, env = "TABFLOW_NODE_MEMORY_MB", default_value_t = 8192)]
    node_memory_mb: u64,

    #[arg(long, env = "TABFLOW_MASTER_MEMORY_MB", default_value_t = 2048)]
    master_memory_mb: u64,

    #[arg(long, env = "TABFLOW_MAP_MEMORY_MB", default_value_t = 4096)]
    map_memory_mb: u64,

    #[arg(long, env = "TABFLOW_REDUCE_MEMORY_MB", default_value_t = 2048)]
    reduce_memory_mb: u64,

    /// Worker figure used when cluster status cannot be retrieved.
    #[arg(long, env = "TABFLOW_FALLBACK_WORKERS", default_value_t = 1)]
    fallback_workers: u32,

    /// Approximate table item count, for per-split hints.
    #[arg(long, env = "TABFLOW_ITEM_COUNT")]
    item_count: Option<u64>,
}

#[derive(Debug, Serialize)]
struct PlanOutput {
    table: String,
    max_concurrent_workers: u32,
    read_units_per_worker: u64,
    write_units_per_worker: u64,
    splits: Vec<SplitOutput>,
}

#[derive(Debug, Serialize)]
struct SplitOutput {
    worker: u32,
    segments: Vec<u32>,
    approximate_item_count: Option<u64>,
}

/// Table description assembled from command-line figures, standing in for
/// a live describe call.
struct StaticTable {
    description: TableDescription,
}

impl DescribeTable for StaticTable {
    fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError> {
        if table != self.description.table_name {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        }
        Ok(self.description.clone())
    }
}

fn job_config(args: &Args) -> JobConfig {
    JobConfig {
        table_name: args.table.clone(),
        read_throughput_percent: args.read_percent,
        write_throughput_percent: args.write_percent,
        on_demand_assumed_units: args.on_demand_assumed_units,
        node_memory_mb: args.node_memory_mb,
        master_memory_mb: args.master_memory_mb,
        map_memory_mb: args.map_memory_mb,
        reduce_memory_mb: args.reduce_memory_mb,
        reducer_count: args.reducers,
        configured_worker_count: args.workers,
        fallback_max_workers: args.fallback_workers,
        ..JobConfig::default()
    }
}

fn cluster_description(args: &Args) -> Result<Option<ClusterDescription>> {
    if let Some(path) = &args.cluster_file {
        return Ok(Some(ClusterDescription::from_file(path)?));
    }
    Ok(args.nodes.map(|node_count| ClusterDescription {
        node_count,
        node_memory_mb: args.node_memory_mb,
    }))
}

fn table_description(args: &Args) -> TableDescription {
    let billing_mode = if args.read_units.is_some() || args.write_units.is_some() {
        BillingMode::Provisioned
    } else {
        BillingMode::OnDemand
    };
    TableDescription {
        table_name: args.table.clone(),
        billing_mode,
        read_capacity_units: args.read_units,
        write_capacity_units: args.write_units,
        item_count: args.item_count,
    }
}

fn main() -> Result<()> {
    tabflow_observe::logging::init_tracing();
    let args = Args::parse();

    let config = job_config(&args);
    config.validate()?;

    let provider = ClusterCapacityProvider::new(None, cluster_description(&args)?);
    let planner = ConcurrencyPlanner::new(provider, config.clone());
    let planned_workers = planner.max_workers();
    let worker_count = planned_workers.min(config.configured_worker_count).max(1);
    info!(
        table = %config.table_name,
        planned_workers,
        worker_count,
        "planned concurrency"
    );

    let client: Arc<dyn DescribeTable> = Arc::new(StaticTable {
        description: table_description(&args),
    });
    let read_units_per_worker =
        ThroughputCalculator::new(Arc::clone(&client), AccessKind::Read, &config, planned_workers)
            .target_units_per_worker()?;
    let write_units_per_worker =
        ThroughputCalculator::new(Arc::clone(&client), AccessKind::Write, &config, planned_workers)
            .target_units_per_worker()?;

    let mut splits = generate_splits(worker_count, args.total_segments)?;
    annotate_splits(&mut splits, args.item_count, None);
    info!(
        table = %config.table_name,
        splits = splits.len(),
        total_segments = args.total_segments,
        read_units_per_worker,
        write_units_per_worker,
        "generated split plan"
    );

    let plan = PlanOutput {
        table: config.table_name.clone(),
        max_concurrent_workers: worker_count,
        read_units_per_worker,
        write_units_per_worker,
        splits: splits
            .iter()
            .enumerate()
            .map(|(worker, split)| SplitOutput {
                worker: worker as u32,
                segments: split.segments.clone(),
                approximate_item_count: split.approximate_item_count,
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
