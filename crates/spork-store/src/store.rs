//! The spork store: composes the directory, connection manager and fetchers
//! into the public query operations.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{error, info};

use spork_core::{BlockEvents, ErrorTransaction, Result, SporkList, StoreConfig};

use crate::batch::fetch_events_adaptive;
use crate::connection::ConnectionManager;
use crate::directory::SporkDirectory;
use crate::fanout::{sort_block_events, FanOutFetcher};
use crate::reader::EventReader;
use crate::transport::{AccessNodeClient, Connector};

/// Answers range queries for chain events across all sporks of one stage.
///
/// Constructed once at process start and passed by handle; there is no
/// ambient default instance.
pub struct SporkStore {
    config: StoreConfig,
    directory: SporkDirectory,
    connections: ConnectionManager,
}

impl SporkStore {
    /// Loads the spork directory and builds the store. A failed initial load
    /// is fatal: without a snapshot no range can be resolved.
    pub async fn connect(config: StoreConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        let directory =
            SporkDirectory::load(config.stage.clone(), config.network_config_url.clone()).await?;
        info!(stage = %config.stage, sporks = directory.snapshot().len(), "spork store ready");
        Ok(Self {
            connections: ConnectionManager::new(connector),
            directory,
            config,
        })
    }

    /// Builds a store around an existing spork list without fetching the
    /// feed. Intended for tests and embedders that manage the list themselves.
    pub fn with_spork_list(
        config: StoreConfig,
        connector: Arc<dyn Connector>,
        sporks: SporkList,
    ) -> Self {
        let directory = SporkDirectory::with_snapshot(
            config.stage.clone(),
            config.network_config_url.clone(),
            sporks,
        );
        Self {
            connections: ConnectionManager::new(connector),
            directory,
            config,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Spawns the periodic directory refresh. A failed refresh is logged and
    /// the previous snapshot keeps serving; only the initial load is fatal.
    pub fn spawn_refresh_task(self: &Arc<Self>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(store.config.refresh_interval);
            // The first tick fires immediately; the initial load already ran.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = store.directory.refresh().await {
                    error!(error = %e, "spork directory refresh failed, keeping previous snapshot");
                }
            }
        })
    }

    async fn latest_client(&self) -> Result<Arc<dyn AccessNodeClient>> {
        let sporks = self.directory.snapshot();
        let latest = sporks.latest()?;
        self.connections.get(&latest.access_node).await
    }
}

#[async_trait]
impl EventReader for SporkStore {
    fn describe(&self) -> String {
        format!(
            "SporkStore{{stage: {}, maxQueryBlocks: {}, queryBatchSize: {}, sporks: {}}}",
            self.config.stage,
            self.config.max_query_blocks,
            self.config.query_batch_size,
            self.directory.snapshot().len(),
        )
    }

    async fn sync_sporks(&self) -> Result<()> {
        self.directory.refresh().await
    }

    async fn query_latest_block_height(&self) -> Result<u64> {
        let header = self.latest_client().await?.latest_block_header().await?;
        Ok(header.height)
    }

    async fn query_event_by_block_range(
        &self,
        event_type: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<BlockEvents>> {
        let sporks = self.directory.snapshot();
        let resolved = sporks.resolve(start, end, self.config.max_query_blocks)?;

        let mut events = Vec::new();
        for node in &resolved {
            let client = self.connections.get(&node.access_node).await?;
            let batch = fetch_events_adaptive(
                client.as_ref(),
                event_type,
                node.start,
                node.end,
                self.config.query_batch_size,
            )
            .await?;
            events.extend(batch);
        }
        // Segments are height-ordered by construction and each batch is
        // fetched in cursor order, so the concatenation needs no re-sort.
        Ok(events)
    }

    async fn query_all_event_by_block_range(
        &self,
        start: u64,
        end: u64,
    ) -> Result<(Vec<BlockEvents>, Vec<ErrorTransaction>)> {
        let sporks = self.directory.snapshot();
        let resolved = sporks.resolve(start, end, self.config.max_query_blocks)?;

        let limiter = self
            .config
            .max_concurrent_fetches
            .map(|bound| Arc::new(Semaphore::new(bound)));

        let mut blocks = Vec::new();
        let mut error_transactions = Vec::new();
        for node in &resolved {
            let client = self.connections.get(&node.access_node).await?;
            let fetcher = FanOutFetcher::new(client, limiter.clone());
            let all = fetcher.fetch_range(node.start, node.end).await?;
            blocks.extend(all.blocks);
            error_transactions.extend(all.error_transactions);
        }

        // Sorted across all segments combined: segment boundaries are not
        // event boundaries, and fan-out completion order is nondeterministic.
        sort_block_events(&mut blocks);
        Ok((blocks, error_transactions))
    }

    async fn close(&self) {
        self.connections.close_all().await;
    }
}
