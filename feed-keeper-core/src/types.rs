use crate::error::{KeeperError, KeeperResult};
use alloy::primitives::{Address, Bytes, B256, I256};
use serde::{Deserialize, Deserializer};
use std::{fmt, str::FromStr};

/// Number of fixed-point decimals carried by every oracle price.
pub const PRICE_DECIMALS: u32 = 8;
/// `10^PRICE_DECIMALS`; also the deviation value that means "100%".
pub const PRICE_SCALE: u128 = 10u128.pow(PRICE_DECIMALS);

pub const DEFAULT_MIN_DEVIATION_PCT: PctNumber = 0.5;
pub const DEFAULT_MIN_ELAPSED_HOURS: f64 = 6.0;
/// Staleness SLA for on-chain round data, in seconds (6 hours).
pub const DEFAULT_MAX_DATA_AGE: DurationInSeconds = 6 * 60 * 60;

// Type aliases for the integer domains the keeper deals in.
pub type Price = u128;
pub type TimestampMs = u64;
pub type UnixTimestamp = u64;
pub type DurationInSeconds = u64;
pub type PctNumber = f64;

/// 32-byte identifier of a data feed.
///
/// Derived from the feed symbol by right-padding its UTF-8 bytes with zeros, the
/// same layout `formatBytes32String` produces. Symbols are limited to 31 bytes
/// and may not contain NUL, so two distinct symbols never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeedId(B256);

impl FeedId {
    pub const MAX_SYMBOL_LEN: usize = 31;

    pub fn from_symbol(symbol: &str) -> KeeperResult<Self> {
        let bytes = symbol.as_bytes();
        if bytes.is_empty() || bytes.len() > Self::MAX_SYMBOL_LEN || bytes.contains(&0) {
            return Err(KeeperError::InvalidSymbol(symbol.to_string()));
        }
        let mut word = [0u8; 32];
        word[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(B256::from(word)))
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }

    /// Recovers the symbol, stopping at the first zero byte.
    pub fn symbol(&self) -> String {
        let raw = self.0.as_slice();
        let end = raw.iter().position(|b| *b == 0).unwrap_or(raw.len());
        String::from_utf8_lossy(&raw[..end]).into_owned()
    }
}

impl From<B256> for FeedId {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl fmt::Display for FeedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol())
    }
}

/// Per-cycle state of one tracked feed.
///
/// All price state starts unset. The live price is written at most once per
/// cycle; the stored values stay unset when the chain has nothing for the feed.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedFeed {
    pub symbol: String,
    pub feed_id: FeedId,
    pub live_price: Option<Price>,
    pub stored_price: Option<Price>,
    pub stored_timestamp: Option<TimestampMs>,
}

impl TrackedFeed {
    pub fn new(symbol: &str) -> KeeperResult<Self> {
        Ok(Self {
            symbol: symbol.to_string(),
            feed_id: FeedId::from_symbol(symbol)?,
            live_price: None,
            stored_price: None,
            stored_timestamp: None,
        })
    }

    /// Records an attested value as the live price.
    ///
    /// Returns `false` and leaves the feed untouched if a live price is already
    /// set or the value is zero.
    pub fn record_live_price(&mut self, value: Price) -> bool {
        if self.live_price.is_some() || value == 0 {
            return false;
        }
        self.live_price = Some(value);
        true
    }
}

/// A single price point out of an already verified package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttestedPricePoint {
    pub feed_id: FeedId,
    pub value: Price,
}

/// A package of attested price points, in the order the decoder produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestedPackage {
    pub timestamp_ms: TimestampMs,
    pub signer: Address,
    pub points: Vec<AttestedPricePoint>,
}

/// Feed ids chosen for update in a single cycle, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    feed_ids: Vec<FeedId>,
}

impl UpdateBatch {
    pub(crate) fn push(&mut self, feed_id: FeedId) {
        self.feed_ids.push(feed_id);
    }

    pub fn feed_ids(&self) -> &[FeedId] {
        &self.feed_ids
    }

    pub fn is_empty(&self) -> bool {
        self.feed_ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.feed_ids.len()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.feed_ids.iter().map(FeedId::symbol).collect()
    }
}

/// The update transaction payload handed to whatever signs and submits it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub to: Address,
    pub calldata: Bytes,
}

/// Return values of an aggregator's `latestRoundData()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundData {
    pub round_id: u128,
    pub answer: I256,
    pub started_at: UnixTimestamp,
    pub updated_at: UnixTimestamp,
    pub answered_in_round: u128,
}

/// Return values of the oracle's `getLastUpdateDetails(bytes32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastUpdateDetails {
    /// Timestamp of the attested data last written, in milliseconds.
    pub data_timestamp: TimestampMs,
    pub block_timestamp: UnixTimestamp,
    pub value: Price,
}

/// One staleness observation of a monitored aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalenessSample {
    pub contract_address: Address,
    pub token_pair: String,
    pub answer: I256,
    pub started_at: UnixTimestamp,
    pub updated_at: UnixTimestamp,
}

/// Which attestation service produced the payload of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataService {
    RedstonePrimaryProd,
    RedstoneMainDemo,
}

impl DataService {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataService::RedstonePrimaryProd => "redstone-primary-prod",
            DataService::RedstoneMainDemo => "redstone-main-demo",
        }
    }
}

impl fmt::Display for DataService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataService {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redstone-primary-prod" => Ok(DataService::RedstonePrimaryProd),
            "redstone-main-demo" => Ok(DataService::RedstoneMainDemo),
            other => anyhow::bail!("Unknown data service: {}", other),
        }
    }
}

/// Inputs supplied by the scheduler for one update cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub now_ms: TimestampMs,
    pub symbols: Vec<String>,
    pub data_service: DataService,
}

/// Alert priority understood by the incident tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Severity {
    P1,
    P2,
    P3,
    P4,
    P5,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::P1 => "P1",
            Severity::P2 => "P2",
            Severity::P3 => "P3",
            Severity::P4 => "P4",
            Severity::P5 => "P5",
        };
        f.write_str(label)
    }
}

// --- Configuration ---

/// Top-level keeper configuration, read from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct KeeperConfig {
    /// Oracle contract holding the stored prices and accepting updates.
    #[serde(deserialize_with = "deserialize_address")]
    pub oracle_address: Address,
    pub data_service: DataService,
    /// Feed symbols tracked by the update cycle (e.g. "ETH").
    pub symbols: Vec<String>,
    #[serde(default)]
    pub thresholds: UpdateThresholds,
    #[serde(default)]
    pub staleness: StalenessPolicy,
    #[serde(default)]
    pub monitors: Vec<MonitorConfig>,
}

/// Update triggers. Either one being met selects the feed.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub struct UpdateThresholds {
    /// Price deviation threshold (as a percentage).
    #[serde(rename = "price_deviation", default = "default_min_deviation_pct")]
    pub min_deviation_pct: PctNumber,
    /// Hours since the stored update after which the feed is refreshed anyway.
    #[serde(rename = "time_elapsed_hours", default = "default_min_elapsed_hours")]
    pub min_elapsed_hours: f64,
}

fn default_min_deviation_pct() -> PctNumber {
    DEFAULT_MIN_DEVIATION_PCT
}

fn default_min_elapsed_hours() -> f64 {
    DEFAULT_MIN_ELAPSED_HOURS
}

impl Default for UpdateThresholds {
    fn default() -> Self {
        Self {
            min_deviation_pct: DEFAULT_MIN_DEVIATION_PCT,
            min_elapsed_hours: DEFAULT_MIN_ELAPSED_HOURS,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StalenessPolicy {
    /// Maximum allowed age of `updatedAt`, in seconds.
    #[serde(default = "default_max_age")]
    pub max_age: DurationInSeconds,
    #[serde(default)]
    pub alert: AlertPolicy,
}

fn default_max_age() -> DurationInSeconds {
    DEFAULT_MAX_DATA_AGE
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self {
            max_age: DEFAULT_MAX_DATA_AGE,
            alert: AlertPolicy::default(),
        }
    }
}

/// Routing and wording of staleness alerts.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AlertPolicy {
    /// Tag prepended to alert messages, rendered as `[source]`.
    #[serde(default = "default_alert_source")]
    pub source: String,
    #[serde(default = "default_alert_team")]
    pub team: String,
    #[serde(default = "default_alert_priority")]
    pub priority: Severity,
}

fn default_alert_source() -> String {
    "Keeper".to_string()
}

fn default_alert_team() -> String {
    "Lisk".to_string()
}

fn default_alert_priority() -> Severity {
    Severity::P2
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            source: default_alert_source(),
            team: default_alert_team(),
            priority: default_alert_priority(),
        }
    }
}

/// A monitored aggregator contract.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MonitorConfig {
    /// Token pair label used in logs and alerts (e.g. "ETH/USD").
    pub token_pair: String,
    #[serde(deserialize_with = "deserialize_address")]
    pub contract_address: Address,
}

fn deserialize_address<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Address::from_str(raw.trim())
        .map_err(|e| serde::de::Error::custom(format!("invalid address {raw:?}: {e}")))
}
