//! spork-core: data model and range-resolution logic for the spork event fetcher
//!
//! A "spork" is one incarnation of the network: the operator periodically
//! terminates the chain and restarts it under a new identity, each incarnation
//! covering a contiguous, non-overlapping range of block heights and served by
//! its own access node. This crate holds the pure pieces of the engine:
//! - the spork list and height location (binary search over root heights)
//! - range resolution onto (access node, sub-range) segments
//! - the event/block/transaction data model shared with the transport layer
//!
//! Everything that talks to the network lives in `spork-store`.

mod config;
mod error;
mod resolver;
mod types;

pub use config::{StoreConfig, constants};
pub use error::Error;
pub use resolver::{ResolvedAccessNode, SporkList};
pub use types::{
    Block, BlockEvents, BlockHeader, Collection, ErrorTransaction, Event, EventField, Identifier,
    Spork, TransactionResult,
};

pub type Result<T> = std::result::Result<T, Error>;
