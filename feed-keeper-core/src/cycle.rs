use crate::{
    abi::encode_update_call,
    aggregator::aggregate_live_prices,
    chain::{ChainReader, PayloadDecoder},
    decision::{decide, Decision},
    error::{KeeperError, KeeperResult},
    registry::FeedRegistry,
    types::{Trigger, UpdateCall, UpdateThresholds},
};
use alloy::primitives::Address;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

/// What the scheduler should do after an update cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Skip { reason: String },
    Execute(UpdateCall),
}

impl CycleOutcome {
    /// Renders the outcome as `{execute: false, reason}` or
    /// `{execute: true, to, calldata}`.
    pub fn to_json(&self) -> Value {
        match self {
            CycleOutcome::Skip { reason } => json!({
                "execute": false,
                "reason": reason,
            }),
            CycleOutcome::Execute(call) => json!({
                "execute": true,
                "to": call.to.to_string(),
                "calldata": format!("0x{}", hex::encode(&call.calldata)),
            }),
        }
    }
}

/// Runs update cycles against one oracle contract.
#[derive(Debug)]
pub struct UpdateCycle<R: ChainReader, D: PayloadDecoder> {
    reader: R,
    decoder: D,
    oracle_address: Address,
    thresholds: UpdateThresholds,
}

impl<R: ChainReader, D: PayloadDecoder> UpdateCycle<R, D> {
    pub fn new(
        reader: R,
        decoder: D,
        oracle_address: Address,
        thresholds: UpdateThresholds,
    ) -> Self {
        Self {
            reader,
            decoder,
            oracle_address,
            thresholds,
        }
    }

    /// Evaluates one cycle from scratch.
    ///
    /// Decode failures, missing feeds and clock inversions abort the cycle. A
    /// failed stored-price read only leaves that feed's stored state unset,
    /// which forces it into the batch.
    #[instrument(
        skip_all,
        name = "update_cycle",
        fields(data_service = %trigger.data_service, now_ms = trigger.now_ms)
    )]
    pub async fn run(&self, trigger: &Trigger, raw_payload: &[u8]) -> KeeperResult<CycleOutcome> {
        info!(symbols = ?trigger.symbols, "Starting update cycle.");
        let mut registry = FeedRegistry::new(&trigger.symbols)?;

        let packages = self
            .decoder
            .decode(raw_payload)
            .map_err(|e| KeeperError::Decode(format!("{:#}", e)))?;
        debug!(count = packages.len(), "Decoded attested packages");

        aggregate_live_prices(&mut registry, &packages)?;

        for feed in registry.iter_mut() {
            match self
                .reader
                .last_update_details(self.oracle_address, feed.feed_id)
                .await
            {
                Ok(details) => {
                    feed.stored_price = Some(details.value);
                    feed.stored_timestamp = Some(details.data_timestamp);
                }
                Err(e) => {
                    debug!(
                        symbol = %feed.symbol,
                        error = %e,
                        "No stored price found, using defaults"
                    );
                }
            }
            info!(
                symbol = %feed.symbol,
                live_price = feed.live_price.unwrap_or(0),
                stored_price = feed.stored_price.unwrap_or(0),
                stored_timestamp = feed.stored_timestamp.unwrap_or(0),
                "Feed prices"
            );
        }

        match decide(&registry, trigger.now_ms, &self.thresholds)? {
            Decision::NoAction { reason } => Ok(CycleOutcome::Skip { reason }),
            Decision::Execute(batch) => {
                let calldata = encode_update_call(&batch);
                info!(
                    to = %self.oracle_address,
                    feeds = ?batch.symbols(),
                    bytes = calldata.len(),
                    "Built update call"
                );
                Ok(CycleOutcome::Execute(UpdateCall {
                    to: self.oracle_address,
                    calldata,
                }))
            }
        }
    }

    /// Like [`UpdateCycle::run`], but folds a failed cycle into a `Skip`
    /// carrying the error, the shape an automation trigger consumes.
    pub async fn run_or_skip(&self, trigger: &Trigger, raw_payload: &[u8]) -> CycleOutcome {
        match self.run(trigger, raw_payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Update cycle failed");
                CycleOutcome::Skip {
                    reason: format!("Execution error: {}", e),
                }
            }
        }
    }
}
