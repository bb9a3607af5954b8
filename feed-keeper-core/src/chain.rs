use crate::{
    alert::AlertRequest,
    types::{AttestedPackage, FeedId, LastUpdateDetails, RoundData},
};
use alloy::primitives::{Address, Bytes};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Read-only access to on-chain oracle state.
///
/// Implementors provide the chain-specific transport. Calls are made one at a
/// time by the keeper and are expected to reflect the latest block.
#[async_trait]
pub trait ChainReader: Send + Sync + Debug {
    /// Reads `latestRoundData()` from an aggregator contract.
    async fn latest_round_data(&self, contract: Address) -> Result<RoundData>;

    /// Reads `getLastUpdateDetails(feedId)` from the oracle contract.
    ///
    /// An error here is not necessarily fatal: the update cycle treats it as
    /// "never written" for that feed.
    async fn last_update_details(
        &self,
        oracle: Address,
        feed_id: FeedId,
    ) -> Result<LastUpdateDetails>;
}

/// Raw `eth_call` transport, the seam beneath [`crate::abi::AbiChainReader`].
#[async_trait]
pub trait EthCall: Send + Sync + Debug {
    /// Executes a read-only call against the latest block and returns the raw
    /// return data.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;
}

/// Turns a raw attested payload into packages.
///
/// The output is trusted: signatures and signer quorum have been verified by
/// the time this returns.
pub trait PayloadDecoder: Send + Sync + Debug {
    fn decode(&self, raw: &[u8]) -> Result<Vec<AttestedPackage>>;
}

/// Destination for operator alerts.
#[async_trait]
pub trait AlertSink: Send + Sync + Debug {
    /// Sends the alert and returns the delivery status reported by the sink.
    async fn send(&self, alert: &AlertRequest) -> Result<String>;
}
