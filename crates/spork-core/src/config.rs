//! Store configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Defaults shared by the store and the CLI.
pub mod constants {
    /// Public network configuration feed listing every spork per stage.
    pub const DEFAULT_NETWORK_CONFIG_URL: &str =
        "https://raw.githubusercontent.com/onflow/flow/master/sporks.json";

    /// Endpoint used for testnet sporks that list no access node in the feed.
    pub const TESTNET_FALLBACK_ENDPOINT: &str = "access.devnet.nodes.onflow.org:9000";

    /// Widest block range a single query may cover.
    pub const DEFAULT_MAX_QUERY_BLOCKS: u64 = 2000;

    /// Initial batch size for typed range queries.
    pub const DEFAULT_QUERY_BATCH_SIZE: u64 = 200;

    /// How often the spork directory is refreshed in the background.
    pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 3600;
}

/// Configuration for a [`SporkStore`](../spork-store) instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Network stage to serve (e.g. "mainnet", "testnet").
    pub stage: String,
    /// URL of the network configuration feed.
    pub network_config_url: String,
    /// Widest block range a single query may cover.
    pub max_query_blocks: u64,
    /// Initial batch size for typed range queries; shrinks by halving when an
    /// endpoint rejects a batch.
    pub query_batch_size: u64,
    /// Interval for the background directory refresh.
    pub refresh_interval: Duration,
    /// Upper bound on concurrently in-flight fan-out RPCs. `None` leaves the
    /// fan-out unbounded; the query range itself is then the only
    /// backpressure control.
    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,
}

impl StoreConfig {
    pub fn new(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            ..Self::default()
        }
    }

    pub fn with_network_config_url(mut self, url: impl Into<String>) -> Self {
        self.network_config_url = url.into();
        self
    }

    pub fn with_max_query_blocks(mut self, max: u64) -> Self {
        self.max_query_blocks = max;
        self
    }

    pub fn with_query_batch_size(mut self, size: u64) -> Self {
        self.query_batch_size = size;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_max_concurrent_fetches(mut self, limit: Option<usize>) -> Self {
        self.max_concurrent_fetches = limit;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            stage: "mainnet".into(),
            network_config_url: constants::DEFAULT_NETWORK_CONFIG_URL.into(),
            max_query_blocks: constants::DEFAULT_MAX_QUERY_BLOCKS,
            query_batch_size: constants::DEFAULT_QUERY_BATCH_SIZE,
            refresh_interval: Duration::from_secs(constants::DEFAULT_REFRESH_INTERVAL_SECS),
            max_concurrent_fetches: None,
        }
    }
}
