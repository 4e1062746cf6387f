//! In-memory transport for tests.
//!
//! [`MockAccessNode`] is a scriptable access node: register blocks,
//! collections and transaction results up front, then point the engine at it
//! through [`MockConnector`]. Failure injection covers pings, block fetches,
//! transaction fetches and over-wide range queries; every range query is
//! recorded for assertions.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use spork_core::{
    Block, BlockEvents, BlockHeader, Collection, Error, Event, EventField, Identifier, Result,
    TransactionResult,
};

use crate::transport::{AccessNodeClient, Connector};

#[derive(Default)]
struct MockState {
    blocks: Mutex<HashMap<u64, Block>>,
    events_by_height: Mutex<HashMap<u64, Vec<Event>>>,
    collections: Mutex<HashMap<Identifier, Collection>>,
    transaction_results: Mutex<HashMap<Identifier, TransactionResult>>,

    failing_blocks: Mutex<HashSet<u64>>,
    failing_transactions: Mutex<HashSet<Identifier>>,
    max_range_width: Mutex<Option<u64>>,
    failing_pings: AtomicU64,

    recorded_ranges: Mutex<Vec<(u64, u64)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    closed: AtomicU64,
}

struct InFlightGuard<'a>(&'a MockState);

impl MockState {
    fn enter(&self) -> InFlightGuard<'_> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        InFlightGuard(self)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A scriptable in-memory access node.
#[derive(Clone, Default)]
pub struct MockAccessNode {
    state: Arc<MockState>,
}

impl MockAccessNode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a test event.
    pub fn event(
        event_type: &str,
        transaction_id: Identifier,
        transaction_index: u32,
        event_index: u32,
    ) -> Event {
        Event {
            event_type: event_type.to_string(),
            event_id: format!("{event_type}.{transaction_index}.{event_index}"),
            transaction_id,
            transaction_index,
            event_index,
            payload: vec![],
            fields: vec![EventField {
                name: "amount".into(),
                value: "1.0".into(),
            }],
        }
    }

    pub fn add_block(
        &self,
        height: u64,
        block_id: Identifier,
        timestamp: u64,
        collection_ids: &[Identifier],
    ) {
        self.state.blocks.lock().unwrap().insert(
            height,
            Block {
                block_id,
                height,
                timestamp,
                collection_ids: collection_ids.to_vec(),
            },
        );
    }

    /// Registers an event served by the typed range-query endpoint.
    pub fn add_typed_event(
        &self,
        height: u64,
        event_type: &str,
        transaction_index: u32,
        event_index: u32,
    ) {
        let event = Self::event(
            event_type,
            Identifier::new([height as u8; 32]),
            transaction_index,
            event_index,
        );
        self.state
            .events_by_height
            .lock()
            .unwrap()
            .entry(height)
            .or_default()
            .push(event);
    }

    pub fn add_collection(&self, id: Identifier, transaction_ids: &[Identifier]) {
        self.state.collections.lock().unwrap().insert(
            id,
            Collection {
                transaction_ids: transaction_ids.to_vec(),
            },
        );
    }

    pub fn add_transaction_result(
        &self,
        id: Identifier,
        events: Vec<Event>,
        error_message: Option<String>,
    ) {
        self.state.transaction_results.lock().unwrap().insert(
            id,
            TransactionResult {
                events,
                error_message,
            },
        );
    }

    /// Range queries covering more than `width` blocks are rejected.
    pub fn reject_ranges_wider_than(&self, width: u64) {
        *self.state.max_range_width.lock().unwrap() = Some(width);
    }

    pub fn fail_next_pings(&self, count: u64) {
        self.state.failing_pings.store(count, Ordering::SeqCst);
    }

    pub fn fail_block(&self, height: u64) {
        self.state.failing_blocks.lock().unwrap().insert(height);
    }

    pub fn fail_transaction(&self, id: Identifier) {
        self.state.failing_transactions.lock().unwrap().insert(id);
    }

    /// Every `(start, end)` the typed range endpoint has seen, including
    /// rejected attempts.
    pub fn recorded_ranges(&self) -> Vec<(u64, u64)> {
        self.state.recorded_ranges.lock().unwrap().clone()
    }

    /// High-water mark of concurrently in-flight calls.
    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> u64 {
        self.state.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessNodeClient for MockAccessNode {
    async fn ping(&self) -> Result<()> {
        let remaining = self.state.failing_pings.load(Ordering::SeqCst);
        if remaining > 0 {
            self.state.failing_pings.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Transport("ping failed".into()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.state.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn latest_block_header(&self) -> Result<BlockHeader> {
        let height = self
            .state
            .blocks
            .lock()
            .unwrap()
            .keys()
            .max()
            .copied()
            .unwrap_or(0);
        Ok(BlockHeader { height })
    }

    async fn block_by_height(&self, height: u64) -> Result<Block> {
        let _guard = self.state.enter();
        tokio::task::yield_now().await;
        if self.state.failing_blocks.lock().unwrap().contains(&height) {
            return Err(Error::Transport(format!("block {height} unavailable")));
        }
        self.state
            .blocks
            .lock()
            .unwrap()
            .get(&height)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("unknown block height {height}")))
    }

    async fn collection(&self, id: &Identifier) -> Result<Collection> {
        let _guard = self.state.enter();
        tokio::task::yield_now().await;
        self.state
            .collections
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("unknown collection {id}")))
    }

    async fn transaction_result(&self, id: &Identifier) -> Result<TransactionResult> {
        let _guard = self.state.enter();
        tokio::task::yield_now().await;
        if self.state.failing_transactions.lock().unwrap().contains(id) {
            return Err(Error::Transport(format!("transaction {id} unavailable")));
        }
        self.state
            .transaction_results
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("unknown transaction {id}")))
    }

    async fn events_for_height_range(
        &self,
        event_type: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<BlockEvents>> {
        let _guard = self.state.enter();
        self.state
            .recorded_ranges
            .lock()
            .unwrap()
            .push((start, end));

        if let Some(width) = *self.state.max_range_width.lock().unwrap() {
            if end - start + 1 > width {
                return Err(Error::Transport(format!(
                    "requested range of {} blocks exceeds node limit",
                    end - start + 1
                )));
            }
        }

        let blocks = self.state.blocks.lock().unwrap();
        let events_by_height = self.state.events_by_height.lock().unwrap();
        let mut result = Vec::with_capacity((end - start + 1) as usize);
        for height in start..=end {
            let (block_id, timestamp) = blocks
                .get(&height)
                .map(|b| (b.block_id, b.timestamp))
                .unwrap_or((Identifier::new([0u8; 32]), 0));
            let events = events_by_height
                .get(&height)
                .map(|events| {
                    events
                        .iter()
                        .filter(|e| e.event_type == event_type)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();
            result.push(BlockEvents {
                block_id,
                height,
                timestamp,
                events,
            });
        }
        Ok(result)
    }
}

/// Dials registered [`MockAccessNode`]s by endpoint address and counts dials.
#[derive(Clone, Default)]
pub struct MockConnector {
    nodes: Arc<Mutex<HashMap<String, MockAccessNode>>>,
    dial_counts: Arc<Mutex<HashMap<String, u64>>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, endpoint: &str, node: MockAccessNode) {
        self.nodes.lock().unwrap().insert(endpoint.to_string(), node);
    }

    pub fn dial_count(&self, endpoint: &str) -> u64 {
        self.dial_counts
            .lock()
            .unwrap()
            .get(endpoint)
            .copied()
            .unwrap_or(0)
    }

    pub fn into_arc(self) -> Arc<dyn Connector> {
        Arc::new(self)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn AccessNodeClient>> {
        *self
            .dial_counts
            .lock()
            .unwrap()
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
        let node = self
            .nodes
            .lock()
            .unwrap()
            .get(endpoint)
            .cloned()
            .ok_or_else(|| Error::Transport(format!("no route to endpoint {endpoint}")))?;
        Ok(Arc::new(node))
    }
}
