//! Single-node backend: one fixed access endpoint, no spork resolution.
//!
//! Used against hosted providers that serve the full height range behind one
//! endpoint. Typed range queries go through the same adaptive batch fetcher;
//! the deep fan-out path is not offered here.

use std::sync::Arc;

use async_trait::async_trait;

use spork_core::{BlockEvents, Error, ErrorTransaction, Result};

use crate::batch::fetch_events_adaptive;
use crate::connection::ConnectionManager;
use crate::reader::EventReader;
use crate::transport::Connector;

pub struct SingleNodeStore {
    endpoint: String,
    max_query_blocks: u64,
    query_batch_size: u64,
    connections: ConnectionManager,
}

impl SingleNodeStore {
    pub fn new(
        endpoint: impl Into<String>,
        max_query_blocks: u64,
        query_batch_size: u64,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            max_query_blocks,
            query_batch_size,
            connections: ConnectionManager::new(connector),
        }
    }

    fn check_range(&self, start: u64, end: u64) -> Result<()> {
        if end < start {
            return Err(Error::InvalidRange { start, end });
        }
        if end - start > self.max_query_blocks {
            return Err(Error::RangeTooLarge {
                start,
                end,
                max: self.max_query_blocks,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl EventReader for SingleNodeStore {
    fn describe(&self) -> String {
        format!(
            "SingleNodeStore{{endpoint: {}, maxQueryBlocks: {}, queryBatchSize: {}}}",
            self.endpoint, self.max_query_blocks, self.query_batch_size,
        )
    }

    /// There is no spork directory to sync for a fixed endpoint.
    async fn sync_sporks(&self) -> Result<()> {
        Ok(())
    }

    async fn query_latest_block_height(&self) -> Result<u64> {
        let client = self.connections.get(&self.endpoint).await?;
        let header = client.latest_block_header().await?;
        Ok(header.height)
    }

    async fn query_event_by_block_range(
        &self,
        event_type: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<BlockEvents>> {
        self.check_range(start, end)?;
        let client = self.connections.get(&self.endpoint).await?;
        fetch_events_adaptive(
            client.as_ref(),
            event_type,
            start,
            end,
            self.query_batch_size,
        )
        .await
    }

    async fn query_all_event_by_block_range(
        &self,
        _start: u64,
        _end: u64,
    ) -> Result<(Vec<BlockEvents>, Vec<ErrorTransaction>)> {
        Err(Error::Unsupported(
            "query_all_event_by_block_range is not available for a single-node store",
        ))
    }

    async fn close(&self) {
        self.connections.close_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockAccessNode, MockConnector};
    use spork_core::Identifier;

    fn store_with_node() -> (SingleNodeStore, MockAccessNode) {
        let connector = MockConnector::new();
        let node = MockAccessNode::new();
        for height in 0..=20 {
            node.add_block(height, Identifier::new([height as u8; 32]), height * 10, &[]);
            node.add_typed_event(height, "A.0x1.Token.Deposited", 0, 0);
        }
        connector.register("alchemy.example:9000", node.clone());
        let store = SingleNodeStore::new("alchemy.example:9000", 2000, 200, connector.into_arc());
        (store, node)
    }

    #[tokio::test]
    async fn test_typed_query_and_latest_height() {
        let (store, _node) = store_with_node();
        assert_eq!(store.query_latest_block_height().await.unwrap(), 20);

        let events = store
            .query_event_by_block_range("A.0x1.Token.Deposited", 0, 20)
            .await
            .unwrap();
        assert_eq!(events.len(), 21);
    }

    #[tokio::test]
    async fn test_range_cap_enforced() {
        let connector = MockConnector::new();
        connector.register("alchemy.example:9000", MockAccessNode::new());
        let store = SingleNodeStore::new("alchemy.example:9000", 10, 200, connector.into_arc());
        assert!(matches!(
            store.query_event_by_block_range("t", 0, 11).await,
            Err(Error::RangeTooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn test_query_all_is_unsupported() {
        let (store, _node) = store_with_node();
        assert!(matches!(
            store.query_all_event_by_block_range(0, 5).await,
            Err(Error::Unsupported(_))
        ));
    }
}
