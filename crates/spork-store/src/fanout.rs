//! Deep fan-out fetcher for unfiltered "all events" queries.
//!
//! The typed range-query endpoint needs an event type, so an unfiltered query
//! has to walk the chain structure instead: block → collection → transaction.
//! Every RPC runs in its own task; each level joins all of its children before
//! reporting upward, and the first error aborts the remaining siblings and the
//! whole call. Task completion order is nondeterministic, so callers must
//! apply [`sort_block_events`] once all segments are collected.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;

use spork_core::{BlockEvents, Error, ErrorTransaction, Event, Identifier, Result};

use crate::metrics;
use crate::transport::AccessNodeClient;

/// Fully reassembled result of one fan-out run.
#[derive(Debug, Default)]
pub struct AllEvents {
    pub blocks: Vec<BlockEvents>,
    pub error_transactions: Vec<ErrorTransaction>,
}

enum TransactionOutcome {
    Events(Vec<Event>),
    Failed(ErrorTransaction),
}

/// Walks every height of a segment through the three fan-out levels against a
/// single access node connection.
#[derive(Clone)]
pub struct FanOutFetcher {
    client: Arc<dyn AccessNodeClient>,
    limiter: Option<Arc<Semaphore>>,
}

impl FanOutFetcher {
    /// `limiter`, when present, bounds the number of concurrently in-flight
    /// RPCs across every level (and across segments sharing the semaphore).
    /// Without one, the width of the query range is the only backpressure.
    pub fn new(client: Arc<dyn AccessNodeClient>, limiter: Option<Arc<Semaphore>>) -> Self {
        Self { client, limiter }
    }

    /// Fetches all events in `[start, end]`. Any RPC failure at any level
    /// fails the whole call; partial results are discarded rather than
    /// returned, since a partially reconstructed block would be misleading.
    pub async fn fetch_range(&self, start: u64, end: u64) -> Result<AllEvents> {
        let mut set = JoinSet::new();
        for height in start..=end {
            let fetcher = self.clone();
            set.spawn(async move { fetcher.fetch_block(height).await });
        }

        let mut all = AllEvents::default();
        for (block, errors) in drain(set).await? {
            all.blocks.push(block);
            all.error_transactions.extend(errors);
        }
        metrics::record_fanout_blocks(all.blocks.len() as u64);
        Ok(all)
    }

    async fn fetch_block(&self, height: u64) -> Result<(BlockEvents, Vec<ErrorTransaction>)> {
        let block = {
            let _permit = self.acquire_permit().await?;
            self.client.block_by_height(height).await?
        };

        let mut set = JoinSet::new();
        for collection_id in block.collection_ids {
            let fetcher = self.clone();
            set.spawn(async move { fetcher.fetch_collection(collection_id).await });
        }

        let mut events = Vec::new();
        let mut error_transactions = Vec::new();
        for (collection_events, collection_errors) in drain(set).await? {
            events.extend(collection_events);
            error_transactions.extend(collection_errors);
        }

        Ok((
            BlockEvents {
                block_id: block.block_id,
                height: block.height,
                timestamp: block.timestamp,
                events,
            },
            error_transactions,
        ))
    }

    async fn fetch_collection(
        &self,
        id: Identifier,
    ) -> Result<(Vec<Event>, Vec<ErrorTransaction>)> {
        let collection = {
            let _permit = self.acquire_permit().await?;
            self.client.collection(&id).await?
        };

        let mut set = JoinSet::new();
        for transaction_id in collection.transaction_ids {
            let fetcher = self.clone();
            set.spawn(async move { fetcher.fetch_transaction(transaction_id).await });
        }

        let mut events = Vec::new();
        let mut error_transactions = Vec::new();
        for outcome in drain(set).await? {
            match outcome {
                TransactionOutcome::Events(transaction_events) => events.extend(transaction_events),
                TransactionOutcome::Failed(error_transaction) => {
                    error_transactions.push(error_transaction)
                }
            }
        }

        Ok((events, error_transactions))
    }

    async fn fetch_transaction(&self, id: Identifier) -> Result<TransactionOutcome> {
        let _permit = self.acquire_permit().await?;
        let result = self.client.transaction_result(&id).await?;

        // An execution error is data, not a failure of the fetch: the
        // transaction contributed no events but must be reported.
        match result.error_message {
            Some(error) => {
                metrics::record_error_transaction();
                Ok(TransactionOutcome::Failed(ErrorTransaction {
                    transaction_id: id,
                    error,
                }))
            }
            None => Ok(TransactionOutcome::Events(result.events)),
        }
    }

    /// Permits are held for the duration of a single RPC only, never across a
    /// child level, so a small bound cannot deadlock the fan-out.
    async fn acquire_permit(&self) -> Result<Option<OwnedSemaphorePermit>> {
        match &self.limiter {
            Some(limiter) => limiter
                .clone()
                .acquire_owned()
                .await
                .map(Some)
                .map_err(|_| Error::Internal("fan-out concurrency limiter closed".into())),
            None => Ok(None),
        }
    }
}

/// Joins every child of one fan-out level, propagating the first error and
/// aborting the remaining siblings.
async fn drain<T: 'static>(mut set: JoinSet<Result<T>>) -> Result<Vec<T>> {
    let mut results = Vec::with_capacity(set.len());
    while let Some(joined) = set.join_next().await {
        let result = match joined {
            Ok(result) => result,
            Err(e) => {
                set.abort_all();
                return Err(Error::Internal(format!("fan-out task failed: {e}")));
            }
        };
        match result {
            Ok(value) => results.push(value),
            Err(e) => {
                set.abort_all();
                return Err(e);
            }
        }
    }
    Ok(results)
}

/// Restores deterministic order after concurrent reassembly: blocks ascending
/// by height, events within each block by `(transaction_index, event_index)`.
pub fn sort_block_events(blocks: &mut [BlockEvents]) {
    blocks.sort_unstable_by_key(|block| block.height);
    for block in blocks {
        block
            .events
            .sort_unstable_by_key(|event| (event.transaction_index, event.event_index));
    }
}
