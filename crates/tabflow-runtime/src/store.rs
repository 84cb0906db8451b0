use thiserror::Error;

use tabflow_core::attr::Item;
use tabflow_core::filter::FilterDescriptor;
use tabflow_core::types::{BillingMode, SegmentId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("table {table} not found")]
    TableNotFound { table: String },
    #[error("store request failed: {detail}")]
    Request { detail: String },
}

/// What a table description exposes to planning and rate control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescription {
    pub table_name: String,
    pub billing_mode: BillingMode,
    pub read_capacity_units: Option<u64>,
    pub write_capacity_units: Option<u64>,
    pub item_count: Option<u64>,
}

/// One page of a parallel segment scan.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub table: String,
    pub segment: SegmentId,
    pub total_segments: u32,
    /// Continuation key from the previous page; `None` starts the segment.
    pub exclusive_start_key: Option<Item>,
    pub limit: Option<u32>,
    pub filter: Option<FilterDescriptor>,
}

#[derive(Debug, Clone)]
pub struct ScanPage {
    pub items: Vec<Item>,
    /// `None` means the segment is exhausted.
    pub last_evaluated_key: Option<Item>,
    pub consumed_capacity_units: f64,
}

/// A single batched write: put a full record, or delete by key.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    Put { item: Item },
    Delete { key: Item },
}

impl WriteRequest {
    pub fn attributes(&self) -> &Item {
        match self {
            WriteRequest::Put { item } => item,
            WriteRequest::Delete { key } => key,
        }
    }
}

/// Store-side outcome of one batch write call.
#[derive(Debug, Clone)]
pub struct BatchWriteOutput {
    pub consumed_capacity_units: f64,
    /// Items the store rejected for capacity reasons; eligible for retry.
    pub unprocessed: Vec<WriteRequest>,
}

/// The describe half of the store client. Split out because throughput
/// calculation needs only this.
pub trait DescribeTable: Send + Sync {
    fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError>;
}

/// Opaque wire-level client for the partitioned key-value store.
///
/// External collaborator: implementations own credentials, transport and
/// retries below the batch level. Everything this system needs is the
/// consumed-capacity reporting on each response.
pub trait TableClient: DescribeTable {
    fn scan_segment(&self, request: &ScanRequest) -> Result<ScanPage, StoreError>;

    fn batch_write(
        &self,
        table: &str,
        batch: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput, StoreError>;
}
