pub mod abi;
pub mod aggregator;
pub mod alert;
pub mod chain;
pub mod config;
pub mod cycle;
pub mod decision;
pub mod error;
pub mod math;
pub mod registry;
pub mod staleness;
pub mod types;

// Re-export key types/functions for easier use by other crates
pub use abi::AbiChainReader;
pub use alert::AlertRequest;
pub use chain::{AlertSink, ChainReader, EthCall, PayloadDecoder};
pub use config::load_keeper_config;
pub use cycle::{CycleOutcome, UpdateCycle};
pub use decision::{decide, Decision};
pub use error::{KeeperError, KeeperResult};
pub use registry::FeedRegistry;
pub use staleness::{StalenessMonitor, StalenessVerdict};
pub use types::{FeedId, KeeperConfig, Trigger, UpdateThresholds};
