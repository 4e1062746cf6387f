//! Spork fetcher CLI
//!
//! Run with:
//! ```bash
//! cargo run -p spork-store --bin spork-fetcher -- --stage mainnet --latest
//! ```

use std::sync::Arc;

use anyhow::bail;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spork_core::{constants, StoreConfig};
use spork_store::{Connector, EventReader, JsonRpcConnector, SingleNodeStore, SporkStore};

#[derive(Parser, Debug)]
#[command(name = "spork-fetcher")]
#[command(about = "Fetch chain events across spork boundaries")]
struct Args {
    /// Network stage to serve
    #[arg(long, default_value = "mainnet")]
    stage: String,

    /// Network configuration feed URL
    #[arg(long, default_value = constants::DEFAULT_NETWORK_CONFIG_URL)]
    config_url: String,

    /// Widest block range a single query may cover
    #[arg(long, default_value = "2000")]
    max_query_blocks: u64,

    /// Initial batch size for typed range queries
    #[arg(long, default_value = "200")]
    query_batch_size: u64,

    /// Query one fixed access node instead of resolving sporks
    #[arg(long)]
    access_node: Option<String>,

    /// API key attached to every request (single-node mode)
    #[arg(long, requires = "access_node")]
    api_key: Option<String>,

    /// Bound on concurrently in-flight fan-out RPCs (unbounded by default)
    #[arg(long)]
    max_concurrent_fetches: Option<usize>,

    /// Just check connectivity and exit
    #[arg(long)]
    check: bool,

    /// Print the latest sealed block height
    #[arg(long)]
    latest: bool,

    /// Event type to fetch over the range
    #[arg(long, requires = "start", requires = "end")]
    event: Option<String>,

    /// Fetch every event in the range, regardless of type
    #[arg(long, requires = "start", requires = "end")]
    all: bool,

    /// Range start height (inclusive)
    #[arg(long)]
    start: Option<u64>,

    /// Range end height (inclusive)
    #[arg(long)]
    end: Option<u64>,
}

impl Args {
    fn range(&self) -> anyhow::Result<(u64, u64)> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok((start, end)),
            _ => bail!("--start and --end are required for range queries"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("spork_store=info".parse()?))
        .init();

    let args = Args::parse();

    let connector: Arc<dyn Connector> = match &args.api_key {
        Some(key) => Arc::new(JsonRpcConnector::with_api_key(key.clone())),
        None => Arc::new(JsonRpcConnector::new()),
    };

    let reader: Arc<dyn EventReader> = match &args.access_node {
        Some(endpoint) => Arc::new(SingleNodeStore::new(
            endpoint.clone(),
            args.max_query_blocks,
            args.query_batch_size,
            connector,
        )),
        None => {
            let config = StoreConfig::new(args.stage.clone())
                .with_network_config_url(args.config_url.clone())
                .with_max_query_blocks(args.max_query_blocks)
                .with_query_batch_size(args.query_batch_size)
                .with_max_concurrent_fetches(args.max_concurrent_fetches);
            Arc::new(SporkStore::connect(config, connector).await?)
        }
    };

    info!(config = %reader.describe(), "spork fetcher configured");

    let result = run(&args, reader.as_ref()).await;
    reader.close().await;
    result
}

async fn run(args: &Args, reader: &dyn EventReader) -> anyhow::Result<()> {
    if args.check {
        let height = reader.query_latest_block_height().await?;
        println!("[OK] connected, latest sealed height {height}");
        return Ok(());
    }

    if args.latest {
        println!("{}", reader.query_latest_block_height().await?);
        return Ok(());
    }

    if let Some(event_type) = &args.event {
        let (start, end) = args.range()?;
        let events = reader
            .query_event_by_block_range(event_type, start, end)
            .await?;
        info!(blocks = events.len(), "typed range query complete");
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    if args.all {
        let (start, end) = args.range()?;
        let (blocks, error_transactions) =
            reader.query_all_event_by_block_range(start, end).await?;
        info!(
            blocks = blocks.len(),
            error_transactions = error_transactions.len(),
            "all-events query complete"
        );
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "blocks": blocks,
                "errorTransactions": error_transactions,
            }))?
        );
        return Ok(());
    }

    println!("{}", reader.describe());
    Ok(())
}
