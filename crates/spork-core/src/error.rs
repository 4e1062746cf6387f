//! Error types for the spork event fetcher

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to fetch spork directory: {0}")]
    DirectoryFetch(String),

    #[error("no network found for stage {0}")]
    UnknownStage(String),

    #[error("spork directory is empty")]
    EmptyDirectory,

    #[error("height {0} is below the earliest known spork root height")]
    HeightBeforeEarliestSpork(u64),

    #[error("invalid block range: start {start} is greater than end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("block range [{start}, {end}] exceeds the maximum of {max} blocks per query")]
    RangeTooLarge { start: u64, end: u64, max: u64 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("range query failed after shrinking batch size to 1: {0}")]
    BatchExhausted(String),

    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    #[error("internal error: {0}")]
    Internal(String),
}
