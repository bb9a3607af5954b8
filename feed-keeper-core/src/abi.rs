//! Solidity interfaces of the oracle contracts and a [`ChainReader`] that
//! speaks them over any [`EthCall`] transport.

use crate::{
    chain::{ChainReader, EthCall},
    types::{FeedId, LastUpdateDetails, Price, RoundData, UpdateBatch},
};
use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument};

sol! {
    /// Multi-feed oracle adapter holding the stored prices.
    interface IPriceFeedsAdapter {
        function updateDataFeedsValuesPartial(bytes32[] dataFeedsIdsPartial) external;

        function getLastUpdateDetails(bytes32 dataFeedId)
            external
            view
            returns (uint256 lastDataTimestamp, uint256 lastBlockTimestamp, uint256 lastValue);
    }

    /// Per-pair aggregator read by the staleness monitor.
    interface IAggregatorV3 {
        function latestRoundData()
            external
            view
            returns (
                uint80 roundId,
                int256 answer,
                uint256 startedAt,
                uint256 updatedAt,
                uint80 answeredInRound
            );
    }
}

/// Encodes the single update call for a batch.
pub fn encode_update_call(batch: &UpdateBatch) -> Bytes {
    let call = IPriceFeedsAdapter::updateDataFeedsValuesPartialCall {
        dataFeedsIdsPartial: batch.feed_ids().iter().map(FeedId::as_b256).collect(),
    };
    Bytes::from(call.abi_encode())
}

fn to_u64(value: U256, field: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| anyhow!("{} does not fit in u64: {}", field, value))
}

/// [`ChainReader`] that ABI-encodes calls and decodes their return data.
#[derive(Debug)]
pub struct AbiChainReader<C: EthCall> {
    transport: C,
}

impl<C: EthCall> AbiChainReader<C> {
    pub fn new(transport: C) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl<C: EthCall> ChainReader for AbiChainReader<C> {
    #[instrument(skip(self), level = "debug")]
    async fn latest_round_data(&self, contract: Address) -> Result<RoundData> {
        let data = IAggregatorV3::latestRoundDataCall {}.abi_encode();
        let output = self
            .transport
            .call(contract, data.into())
            .await
            .with_context(|| format!("latestRoundData call to {} failed", contract))?;
        let ret = IAggregatorV3::latestRoundDataCall::abi_decode_returns(&output, true)
            .context("Failed to decode latestRoundData return data")?;

        let round = RoundData {
            round_id: ret.roundId.to::<u128>(),
            answer: ret.answer,
            started_at: to_u64(ret.startedAt, "startedAt")?,
            updated_at: to_u64(ret.updatedAt, "updatedAt")?,
            answered_in_round: ret.answeredInRound.to::<u128>(),
        };
        debug!(round_id = round.round_id, updated_at = round.updated_at, "Decoded round data");
        Ok(round)
    }

    #[instrument(skip(self), level = "debug")]
    async fn last_update_details(
        &self,
        oracle: Address,
        feed_id: FeedId,
    ) -> Result<LastUpdateDetails> {
        let data = IPriceFeedsAdapter::getLastUpdateDetailsCall {
            dataFeedId: feed_id.as_b256(),
        }
        .abi_encode();
        let output = self
            .transport
            .call(oracle, data.into())
            .await
            .with_context(|| format!("getLastUpdateDetails({}) call failed", feed_id))?;
        let ret = IPriceFeedsAdapter::getLastUpdateDetailsCall::abi_decode_returns(&output, true)
            .context("Failed to decode getLastUpdateDetails return data")?;

        Ok(LastUpdateDetails {
            data_timestamp: to_u64(ret.lastDataTimestamp, "lastDataTimestamp")?,
            block_timestamp: to_u64(ret.lastBlockTimestamp, "lastBlockTimestamp")?,
            value: Price::try_from(ret.lastValue)
                .map_err(|_| anyhow!("lastValue does not fit in u128: {}", ret.lastValue))?,
        })
    }
}
