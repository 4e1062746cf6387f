//! Spork directory: fetches the network configuration feed and serves an
//! atomically swapped snapshot of the spork list.
//!
//! Readers never lock: the current [`SporkList`] lives behind an
//! [`ArcSwap`] and is replaced wholesale on refresh. A failed periodic
//! refresh keeps the previous snapshot serving.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Deserialize;
use tracing::info;

use spork_core::{constants, Error, Result, Spork, SporkList};

#[derive(Deserialize)]
struct NetworkConfig {
    networks: Option<HashMap<String, HashMap<String, StageNetwork>>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageNetwork {
    id: f64,
    name: String,
    root_height: RootHeight,
    #[serde(default)]
    access_nodes: Vec<String>,
}

/// The feed is inconsistent about this field: some entries carry a JSON
/// number, others a decimal string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RootHeight {
    Number(u64),
    Text(String),
}

impl RootHeight {
    fn into_u64(self) -> Result<u64> {
        match self {
            RootHeight::Number(n) => Ok(n),
            RootHeight::Text(s) => s
                .parse()
                .map_err(|e| Error::DirectoryFetch(format!("invalid root height {s:?}: {e}"))),
        }
    }
}

/// Parses the raw feed document into the spork list for one stage, sorted by
/// feed identifier.
pub fn parse_network_config(bytes: &[u8], stage: &str) -> Result<SporkList> {
    let config: NetworkConfig = serde_json::from_slice(bytes)
        .map_err(|e| Error::DirectoryFetch(format!("malformed network config: {e}")))?;

    let mut networks = config
        .networks
        .ok_or_else(|| Error::DirectoryFetch("no networks found in feed".into()))?;

    let stage_config = networks
        .remove(stage)
        .ok_or_else(|| Error::UnknownStage(stage.to_string()))?;

    let mut sporks = Vec::with_capacity(stage_config.len());
    for network in stage_config.into_values() {
        let mut access_node = network.access_nodes.into_iter().next().unwrap_or_default();
        if stage == "testnet" && access_node.is_empty() {
            access_node = constants::TESTNET_FALLBACK_ENDPOINT.to_string();
        }
        sporks.push(Spork {
            id: network.id,
            name: network.name,
            root_height: network.root_height.into_u64()?,
            access_node,
        });
    }
    sporks.sort_by(|a, b| a.id.total_cmp(&b.id));

    Ok(SporkList::new(sporks))
}

/// Holds the current spork list and knows how to refresh it from the feed.
pub struct SporkDirectory {
    stage: String,
    url: String,
    http: reqwest::Client,
    sporks: ArcSwap<SporkList>,
}

impl SporkDirectory {
    /// Fetches the feed and builds the directory. Failure here is fatal; the
    /// store cannot resolve anything without an initial snapshot.
    pub async fn load(stage: impl Into<String>, url: impl Into<String>) -> Result<Self> {
        let directory = Self::with_snapshot(stage, url, SporkList::default());
        directory.refresh().await?;
        Ok(directory)
    }

    /// Builds a directory around an existing snapshot without touching the
    /// network. `refresh` still fetches from `url`.
    pub fn with_snapshot(
        stage: impl Into<String>,
        url: impl Into<String>,
        sporks: SporkList,
    ) -> Self {
        Self {
            stage: stage.into(),
            url: url.into(),
            http: reqwest::Client::new(),
            sporks: ArcSwap::from_pointee(sporks),
        }
    }

    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// The current spork list. Lock-free; the snapshot stays valid even if a
    /// refresh lands while it is in use.
    pub fn snapshot(&self) -> Arc<SporkList> {
        self.sporks.load_full()
    }

    /// Re-fetches the feed and atomically replaces the snapshot.
    pub async fn refresh(&self) -> Result<()> {
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::DirectoryFetch(format!("feed unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::DirectoryFetch(format!(
                "feed returned status {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::DirectoryFetch(format!("failed to read feed body: {e}")))?;

        let sporks = parse_network_config(&bytes, &self.stage)?;
        info!(stage = %self.stage, sporks = sporks.len(), "spork directory refreshed");
        self.sporks.store(Arc::new(sporks));
        Ok(())
    }
}
