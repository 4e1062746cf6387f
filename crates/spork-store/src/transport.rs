//! Transport boundary consumed by the fetch engine.
//!
//! The chain's wire protocol is out of scope here: the engine only requires an
//! RPC surface shaped like the access API below. `rpc` provides the JSON-RPC
//! implementation, `testing` an in-memory one.

use std::sync::Arc;

use async_trait::async_trait;

use spork_core::{Block, BlockEvents, BlockHeader, Collection, Identifier, Result, TransactionResult};

/// A live connection to one access node.
///
/// Implementations must be safe for concurrent use once obtained; the fan-out
/// fetcher issues many calls against the same connection from parallel tasks.
#[async_trait]
pub trait AccessNodeClient: Send + Sync {
    /// Lightweight liveness probe, used before reusing a cached connection.
    async fn ping(&self) -> Result<()>;

    /// Releases underlying resources.
    async fn close(&self) -> Result<()>;

    async fn latest_block_header(&self) -> Result<BlockHeader>;

    async fn block_by_height(&self, height: u64) -> Result<Block>;

    async fn collection(&self, id: &Identifier) -> Result<Collection>;

    async fn transaction_result(&self, id: &Identifier) -> Result<TransactionResult>;

    /// Events of one type over an inclusive height range. Endpoints impose
    /// undocumented, load-dependent limits on the range width and reject
    /// batches that exceed them.
    async fn events_for_height_range(
        &self,
        event_type: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<BlockEvents>>;
}

/// Dials access nodes by endpoint address.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn AccessNodeClient>>;
}
