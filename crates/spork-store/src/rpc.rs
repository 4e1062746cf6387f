//! JSON-RPC transport for access nodes.
//!
//! Speaks JSON-RPC 2.0 over HTTP against the access API. Endpoint addresses
//! from the spork feed usually carry no scheme ("host:port"); plain `http://`
//! is assumed for those.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use spork_core::{
    Block, BlockEvents, BlockHeader, Collection, Error, Identifier, Result, TransactionResult,
};

use crate::transport::{AccessNodeClient, Connector};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// One JSON-RPC connection to an access node.
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    fn new(endpoint: &str, api_key: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT);

        if let Some(key) = api_key {
            let mut headers = reqwest::header::HeaderMap::new();
            let value = reqwest::header::HeaderValue::from_str(key)
                .map_err(|e| Error::Transport(format!("invalid api key: {e}")))?;
            headers.insert("api_key", value);
            builder = builder.default_headers(headers);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Transport(format!("failed to build HTTP client: {e}")))?;

        let url = if endpoint.contains("://") {
            endpoint.to_string()
        } else {
            format!("http://{endpoint}")
        };

        Ok(Self {
            http,
            url,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        debug!(url = %self.url, method, "rpc call");

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{method} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!(
                "{method} failed with status {status}"
            )));
        }

        let body: RpcResponse<R> = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("{method} returned malformed response: {e}")))?;

        if let Some(err) = body.error {
            return Err(Error::Transport(format!(
                "{method} failed: {} (code {})",
                err.message, err.code
            )));
        }

        body.result
            .ok_or_else(|| Error::Transport(format!("{method} returned no result")))
    }
}

#[async_trait]
impl AccessNodeClient for JsonRpcClient {
    async fn ping(&self) -> Result<()> {
        self.call::<_, serde_json::Value>("access_ping", ()).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        // HTTP connections are pooled by the client; dropping it releases them.
        Ok(())
    }

    async fn latest_block_header(&self) -> Result<BlockHeader> {
        self.call("access_getLatestBlockHeader", ()).await
    }

    async fn block_by_height(&self, height: u64) -> Result<Block> {
        self.call("access_getBlockByHeight", (height,)).await
    }

    async fn collection(&self, id: &Identifier) -> Result<Collection> {
        self.call("access_getCollectionById", (id,)).await
    }

    async fn transaction_result(&self, id: &Identifier) -> Result<TransactionResult> {
        self.call("access_getTransactionResult", (id,)).await
    }

    async fn events_for_height_range(
        &self,
        event_type: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<BlockEvents>> {
        self.call("access_getEventsForHeightRange", (event_type, start, end))
            .await
    }
}

/// Dials [`JsonRpcClient`] connections, optionally attaching an API key to
/// every request.
#[derive(Default)]
pub struct JsonRpcConnector {
    api_key: Option<String>,
}

impl JsonRpcConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
        }
    }
}

#[async_trait]
impl Connector for JsonRpcConnector {
    async fn dial(&self, endpoint: &str) -> Result<Arc<dyn AccessNodeClient>> {
        let client = JsonRpcClient::new(endpoint, self.api_key.as_deref())?;
        // Verify reachability up front so dial failures surface as such
        // instead of failing the first query.
        client.ping().await?;
        Ok(Arc::new(client))
    }
}
