//! spork-store: the range-resolution and concurrent-fetch engine.
//!
//! The store answers "all chain events of type X (or every event) between
//! heights A and B" against a chain whose operator periodically sporks the
//! network. A query range may span historical incarnations, each reachable
//! only through its own access node, and any node may be temporarily
//! unhealthy or reject over-wide range queries. The pieces:
//!
//! 1. [`SporkDirectory`] maps heights onto sporks from the network feed.
//! 2. [`ConnectionManager`] keeps one health-checked connection per endpoint.
//! 3. [`fetch_events_adaptive`] runs typed range queries with halving batches.
//! 4. [`FanOutFetcher`] reconstructs unfiltered event sets by walking
//!    block → collection → transaction with per-level task fan-out.
//! 5. [`SporkStore`] composes them behind the [`EventReader`] interface.
//!
//! ## Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use spork_core::StoreConfig;
//! use spork_store::{EventReader, JsonRpcConnector, SporkStore};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = SporkStore::connect(
//!         StoreConfig::new("mainnet"),
//!         Arc::new(JsonRpcConnector::new()),
//!     )
//!     .await?;
//!     let events = store
//!         .query_event_by_block_range("A.0x1.Token.Deposited", 21291000, 21291100)
//!         .await?;
//!     println!("{}", events.len());
//!     Ok(())
//! }
//! ```

mod batch;
mod connection;
mod directory;
mod fanout;
pub mod metrics;
mod reader;
mod rpc;
mod single;
mod store;
pub mod testing;
mod transport;

pub use batch::fetch_events_adaptive;
pub use connection::ConnectionManager;
pub use directory::{parse_network_config, SporkDirectory};
pub use fanout::{sort_block_events, AllEvents, FanOutFetcher};
pub use reader::EventReader;
pub use rpc::{JsonRpcClient, JsonRpcConnector};
pub use single::SingleNodeStore;
pub use store::SporkStore;
pub use transport::{AccessNodeClient, Connector};
