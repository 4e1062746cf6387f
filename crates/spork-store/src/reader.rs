//! The query surface exposed to embedding processes.

use async_trait::async_trait;

use spork_core::{BlockEvents, ErrorTransaction, Result};

/// Common interface over the spork-resolving store and the single-node store;
/// callers receive plain in-memory structures and serialize them however the
/// transport in front of them requires.
#[async_trait]
pub trait EventReader: Send + Sync {
    /// Human-readable configuration summary for operational display.
    fn describe(&self) -> String;

    /// Operator-triggered spork directory resync.
    async fn sync_sporks(&self) -> Result<()>;

    async fn query_latest_block_height(&self) -> Result<u64>;

    /// All events of one type in `[start, end]`, ordered by height.
    async fn query_event_by_block_range(
        &self,
        event_type: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<BlockEvents>>;

    /// All events in `[start, end]` regardless of type, plus the transactions
    /// that executed with an error.
    async fn query_all_event_by_block_range(
        &self,
        start: u64,
        end: u64,
    ) -> Result<(Vec<BlockEvents>, Vec<ErrorTransaction>)>;

    /// Releases all connections.
    async fn close(&self);
}
