use std::collections::{BTreeMap, VecDeque};

use parking_lot::Mutex;

use tabflow_core::attr::{AttributeValue, Item};
use tabflow_core::types::BillingMode;
use tabflow_runtime::store::{
    BatchWriteOutput, DescribeTable, ScanPage, ScanRequest, StoreError, TableClient,
    TableDescription, WriteRequest,
};

/// In-memory stand-in for the partitioned store, keyed by the `pk`
/// attribute. Segment membership is the item's rank (in key order) modulo
/// `total_segments`, so scans are deterministic for a fixed data set.
pub struct InMemoryTableClient {
    description: TableDescription,
    fail_scans: bool,
    state: Mutex<TableState>,
}

#[derive(Default)]
struct TableState {
    items: BTreeMap<String, Item>,
    /// Per upcoming batch: how many trailing items to report unprocessed.
    unprocessed_plan: VecDeque<usize>,
    batches: Vec<Vec<WriteRequest>>,
}

pub fn provisioned_description(table: &str, read_units: u64, write_units: u64) -> TableDescription {
    TableDescription {
        table_name: table.to_string(),
        billing_mode: BillingMode::Provisioned,
        read_capacity_units: Some(read_units),
        write_capacity_units: Some(write_units),
        item_count: None,
    }
}

pub fn item(pk: &str, payload: &str) -> Item {
    let mut item = Item::new();
    item.insert("pk".to_string(), AttributeValue::String(pk.to_string()));
    item.insert(
        "payload".to_string(),
        AttributeValue::String(payload.to_string()),
    );
    item
}

fn key_string(item: &Item) -> Result<String, StoreError> {
    match item.get("pk") {
        Some(AttributeValue::String(s)) => Ok(s.clone()),
        Some(AttributeValue::Number(n)) => Ok(n.clone()),
        _ => Err(StoreError::Request {
            detail: "item has no pk attribute".to_string(),
        }),
    }
}

fn key_only(pk: &str) -> Item {
    let mut item = Item::new();
    item.insert("pk".to_string(), AttributeValue::String(pk.to_string()));
    item
}

impl InMemoryTableClient {
    pub fn new(description: TableDescription) -> Self {
        Self {
            description,
            fail_scans: false,
            state: Mutex::new(TableState::default()),
        }
    }

    pub fn failing_scans(mut self) -> Self {
        self.fail_scans = true;
        self
    }

    /// Queue unprocessed counts for upcoming batches, in order.
    pub fn plan_unprocessed(&self, counts: &[usize]) {
        self.state.lock().unprocessed_plan.extend(counts.iter().copied());
    }

    pub fn seed(&self, items: impl IntoIterator<Item = Item>) {
        let mut state = self.state.lock();
        for item in items {
            let key = key_string(&item).expect("seed item needs a pk");
            state.items.insert(key, item);
        }
    }

    pub fn item_count(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn submitted_batches(&self) -> Vec<Vec<WriteRequest>> {
        self.state.lock().batches.clone()
    }

    /// Keys in segment order, as a scan of every segment would yield them.
    pub fn keys_in_segment(&self, segment: u32, total_segments: u32) -> Vec<String> {
        let state = self.state.lock();
        state
            .items
            .keys()
            .enumerate()
            .filter(|(rank, _)| *rank as u32 % total_segments == segment)
            .map(|(_, key)| key.clone())
            .collect()
    }
}

impl DescribeTable for InMemoryTableClient {
    fn describe_table(&self, table: &str) -> Result<TableDescription, StoreError> {
        if table != self.description.table_name {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        }
        let mut description = self.description.clone();
        description.item_count = Some(self.state.lock().items.len() as u64);
        Ok(description)
    }
}

impl TableClient for InMemoryTableClient {
    fn scan_segment(&self, request: &ScanRequest) -> Result<ScanPage, StoreError> {
        if self.fail_scans {
            return Err(StoreError::Request {
                detail: "injected scan failure".to_string(),
            });
        }
        let segment_keys = self.keys_in_segment(request.segment, request.total_segments);
        let start = match &request.exclusive_start_key {
            Some(key_item) => {
                let pk = key_string(key_item)?;
                segment_keys
                    .iter()
                    .position(|key| *key == pk)
                    .map(|pos| pos + 1)
                    .unwrap_or(0)
            }
            None => 0,
        };
        let limit = request.limit.unwrap_or(10) as usize;
        let end = (start + limit).min(segment_keys.len());

        let state = self.state.lock();
        let items: Vec<Item> = segment_keys[start..end]
            .iter()
            .filter_map(|key| state.items.get(key).cloned())
            .collect();
        let last_evaluated_key = if end < segment_keys.len() {
            segment_keys.get(end - 1).map(|key| key_only(key))
        } else {
            None
        };
        Ok(ScanPage {
            consumed_capacity_units: items.len() as f64,
            items,
            last_evaluated_key,
        })
    }

    fn batch_write(
        &self,
        table: &str,
        batch: Vec<WriteRequest>,
    ) -> Result<BatchWriteOutput, StoreError> {
        if table != self.description.table_name {
            return Err(StoreError::TableNotFound {
                table: table.to_string(),
            });
        }
        let mut state = self.state.lock();
        state.batches.push(batch.clone());

        let reject = state
            .unprocessed_plan
            .pop_front()
            .unwrap_or(0)
            .min(batch.len());
        let accepted_len = batch.len() - reject;
        let mut accepted = batch;
        let unprocessed = accepted.split_off(accepted_len);

        for request in &accepted {
            match request {
                WriteRequest::Put { item } => {
                    let key = key_string(item)?;
                    state.items.insert(key, item.clone());
                }
                WriteRequest::Delete { key } => {
                    let key = key_string(key)?;
                    state.items.remove(&key);
                }
            }
        }
        Ok(BatchWriteOutput {
            consumed_capacity_units: accepted.len() as f64,
            unprocessed,
        })
    }
}
