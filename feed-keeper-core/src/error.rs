//! Error taxonomy for a keeper cycle.

use crate::types::TimestampMs;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("Failed to decode attested payload: {0}")]
    Decode(String),

    #[error("Data feed not found: {0}")]
    FeedNotFound(String),

    #[error("Chain read failed: {0}")]
    ChainRead(String),

    #[error("Current timestamp {current} precedes stored timestamp {stored}")]
    TimePrecondition {
        current: TimestampMs,
        stored: TimestampMs,
    },

    #[error("Invalid feed symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("Duplicate feed symbol: {0}")]
    DuplicateSymbol(String),

    #[error("Tracked symbol set is empty")]
    EmptyFeedSet,
}

pub type KeeperResult<T> = Result<T, KeeperError>;
