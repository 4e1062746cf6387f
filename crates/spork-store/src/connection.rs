//! Per-endpoint connection cache with liveness checks.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::{info, warn};

use spork_core::Result;

use crate::metrics;
use crate::transport::{AccessNodeClient, Connector};

/// Owns one live connection per distinct endpoint address.
///
/// Connections are dialed lazily on first use and verified with a ping before
/// every reuse; a stale connection is replaced in place. The map lock is held
/// only while touching the map itself, never across a ping or dial, so
/// unrelated endpoints make progress independently. Two callers may both
/// detect the same stale connection and both dial; the slower dial simply
/// overwrites the cache. That race is accepted: an extra transient dial is
/// cheaper than cross-task dial deduplication.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    connections: Mutex<HashMap<String, Arc<dyn AccessNodeClient>>>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a live connection for `endpoint`, reusing the cached one when
    /// it still answers a ping.
    pub async fn get(&self, endpoint: &str) -> Result<Arc<dyn AccessNodeClient>> {
        let cached = {
            let connections = self.connections.lock().await;
            connections.get(endpoint).cloned()
        };

        if let Some(client) = cached {
            match client.ping().await {
                Ok(()) => return Ok(client),
                Err(e) => {
                    warn!(endpoint, error = %e, "cached connection failed ping, reconnecting");
                    metrics::record_reconnect(endpoint);
                    let _ = client.close().await;
                }
            }
        }

        let client = self.connector.dial(endpoint).await?;
        info!(endpoint, "access node connection established");

        let mut connections = self.connections.lock().await;
        connections.insert(endpoint.to_string(), client.clone());
        Ok(client)
    }

    /// Closes and forgets the connection for `endpoint`, if any.
    pub async fn close(&self, endpoint: &str) -> Result<()> {
        let removed = {
            let mut connections = self.connections.lock().await;
            connections.remove(endpoint)
        };
        match removed {
            Some(client) => client.close().await,
            None => Ok(()),
        }
    }

    /// Closes every cached connection.
    pub async fn close_all(&self) {
        let drained: Vec<_> = {
            let mut connections = self.connections.lock().await;
            connections.drain().collect()
        };
        let closes = drained.into_iter().map(|(endpoint, client)| async move {
            if let Err(e) = client.close().await {
                warn!(endpoint = %endpoint, error = %e, "failed to close connection");
            }
        });
        join_all(closes).await;
    }
}
