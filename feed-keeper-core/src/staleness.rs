use crate::{
    alert::AlertRequest,
    chain::{AlertSink, ChainReader},
    error::{KeeperError, KeeperResult},
    types::{
        AlertPolicy, DurationInSeconds, MonitorConfig, StalenessPolicy, StalenessSample,
        UnixTimestamp,
    },
};
use alloy::primitives::Address;
use tracing::{error, info, instrument, warn};

/// Result of one staleness check.
#[derive(Debug, Clone, PartialEq)]
pub enum StalenessVerdict {
    Fresh {
        age: DurationInSeconds,
    },
    Stale {
        age: DurationInSeconds,
        alert: AlertRequest,
    },
}

impl StalenessVerdict {
    pub fn is_stale(&self) -> bool {
        matches!(self, StalenessVerdict::Stale { .. })
    }
}

/// Watchdog for one aggregator contract.
///
/// Holds no state between checks: every cycle samples the contract anew and a
/// condition that persists raises a fresh alert each time.
#[derive(Debug, Clone)]
pub struct StalenessMonitor {
    contract_address: Address,
    token_pair: String,
    max_age: DurationInSeconds,
    alert_policy: AlertPolicy,
}

impl StalenessMonitor {
    pub fn new(
        contract_address: Address,
        token_pair: impl Into<String>,
        max_age: DurationInSeconds,
        alert_policy: AlertPolicy,
    ) -> Self {
        Self {
            contract_address,
            token_pair: token_pair.into(),
            max_age,
            alert_policy,
        }
    }

    pub fn from_config(monitor: &MonitorConfig, policy: &StalenessPolicy) -> Self {
        Self::new(
            monitor.contract_address,
            monitor.token_pair.clone(),
            policy.max_age,
            policy.alert.clone(),
        )
    }

    pub fn token_pair(&self) -> &str {
        &self.token_pair
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    /// Reads the latest round of the monitored contract.
    pub async fn sample<R: ChainReader + ?Sized>(
        &self,
        reader: &R,
    ) -> KeeperResult<StalenessSample> {
        let round = reader
            .latest_round_data(self.contract_address)
            .await
            .map_err(|e| {
                KeeperError::ChainRead(format!(
                    "Failed to check {} token pair price update time: {:#}",
                    self.token_pair, e
                ))
            })?;

        info!(
            token_pair = %self.token_pair,
            answer = %round.answer,
            started_at = round.started_at,
            updated_at = round.updated_at,
            "Latest round data"
        );

        Ok(StalenessSample {
            contract_address: self.contract_address,
            token_pair: self.token_pair.clone(),
            answer: round.answer,
            started_at: round.started_at,
            updated_at: round.updated_at,
        })
    }

    /// Classifies a sample. Stale only when the age is strictly above the SLA.
    pub fn evaluate(&self, sample: &StalenessSample, now: UnixTimestamp) -> StalenessVerdict {
        if sample.updated_at > now {
            warn!(
                token_pair = %self.token_pair,
                updated_at = sample.updated_at,
                now,
                "Round updatedAt is ahead of the current time"
            );
        }
        let age = now.saturating_sub(sample.updated_at);

        if age > self.max_age {
            warn!(
                token_pair = %self.token_pair,
                age,
                max_age = self.max_age,
                "Latest data is older than the allowed age"
            );
            let alert =
                AlertRequest::stale_data(&self.token_pair, self.max_age, &self.alert_policy);
            StalenessVerdict::Stale { age, alert }
        } else {
            info!(token_pair = %self.token_pair, age, "Latest data is up-to-date");
            StalenessVerdict::Fresh { age }
        }
    }

    /// Runs one full check: sample, evaluate, and hand any alert to the sink.
    ///
    /// A failed read aborts the cycle. The sink's answer, success or error, is
    /// only logged.
    #[instrument(skip_all, name = "staleness_check", fields(token_pair = %self.token_pair))]
    pub async fn run_cycle<R, S>(
        &self,
        reader: &R,
        sink: &S,
        now: UnixTimestamp,
    ) -> KeeperResult<StalenessVerdict>
    where
        R: ChainReader + ?Sized,
        S: AlertSink + ?Sized,
    {
        let sample = self.sample(reader).await?;
        let verdict = self.evaluate(&sample, now);

        if let StalenessVerdict::Stale { alert, .. } = &verdict {
            match sink.send(alert).await {
                Ok(status) => info!(%status, "Alert creation status"),
                Err(e) => error!(error = %e, "Failed to deliver alert"),
            }
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeedId, LastUpdateDetails, RoundData, Severity};
    use alloy::primitives::I256;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;

    const NOW: UnixTimestamp = 1_700_000_000;
    const SIX_HOURS: DurationInSeconds = 21_600;

    #[derive(Debug)]
    struct FixedRound {
        updated_at: Option<UnixTimestamp>,
    }

    #[async_trait]
    impl ChainReader for FixedRound {
        async fn latest_round_data(&self, _contract: Address) -> Result<RoundData> {
            let updated_at = self.updated_at.ok_or_else(|| anyhow!("connection refused"))?;
            Ok(RoundData {
                round_id: 7,
                answer: I256::ZERO,
                started_at: updated_at,
                updated_at,
                answered_in_round: 7,
            })
        }

        async fn last_update_details(
            &self,
            _oracle: Address,
            _feed_id: FeedId,
        ) -> Result<LastUpdateDetails> {
            Err(anyhow!("not an oracle"))
        }
    }

    #[derive(Debug, Default)]
    struct RecordingSink {
        fail: bool,
        sent: Mutex<Vec<AlertRequest>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send(&self, alert: &AlertRequest) -> Result<String> {
            self.sent.lock().unwrap().push(alert.clone());
            if self.fail {
                Err(anyhow!("503 Service Unavailable"))
            } else {
                Ok("Request will be processed".to_string())
            }
        }
    }

    fn monitor() -> StalenessMonitor {
        StalenessMonitor::new(
            Address::repeat_byte(0x6b),
            "ETH/USD",
            SIX_HOURS,
            AlertPolicy::default(),
        )
    }

    #[tokio::test]
    async fn test_just_over_sla_alerts_once() {
        let reader = FixedRound {
            updated_at: Some(NOW - 21_601),
        };
        let sink = RecordingSink::default();
        let verdict = monitor().run_cycle(&reader, &sink, NOW).await.unwrap();

        assert!(verdict.is_stale());
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].token_pair, "ETH/USD");
        assert_eq!(sent[0].severity, Severity::P2);
        assert!(sent[0].message.contains("older than 6 hours"));
    }

    #[tokio::test]
    async fn test_exactly_at_sla_is_fresh() {
        let reader = FixedRound {
            updated_at: Some(NOW - 21_600),
        };
        let sink = RecordingSink::default();
        let verdict = monitor().run_cycle(&reader, &sink, NOW).await.unwrap();

        assert_eq!(verdict, StalenessVerdict::Fresh { age: 21_600 });
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_cycles_realert() {
        let reader = FixedRound {
            updated_at: Some(NOW - 2 * SIX_HOURS),
        };
        let sink = RecordingSink::default();
        let monitor = monitor();
        for offset in 0..3 {
            let verdict = monitor.run_cycle(&reader, &sink, NOW + offset * 60).await.unwrap();
            assert!(verdict.is_stale());
        }
        assert_eq!(sink.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_read_failure_is_fatal() {
        let reader = FixedRound { updated_at: None };
        let sink = RecordingSink::default();
        let err = monitor().run_cycle(&reader, &sink, NOW).await.unwrap_err();

        assert!(matches!(err, KeeperError::ChainRead(ref msg) if msg.contains("ETH/USD")));
        assert!(sink.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sink_failure_is_not_fatal() {
        let reader = FixedRound {
            updated_at: Some(NOW - SIX_HOURS - 1),
        };
        let sink = RecordingSink {
            fail: true,
            ..Default::default()
        };
        let verdict = monitor().run_cycle(&reader, &sink, NOW).await.unwrap();
        assert!(verdict.is_stale());
        assert_eq!(sink.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_future_update_is_fresh() {
        let sample = StalenessSample {
            contract_address: Address::ZERO,
            token_pair: "ETH/USD".to_string(),
            answer: I256::ZERO,
            started_at: NOW + 30,
            updated_at: NOW + 30,
        };
        assert_eq!(
            monitor().evaluate(&sample, NOW),
            StalenessVerdict::Fresh { age: 0 }
        );
    }

    #[test]
    fn test_from_config_uses_policy() {
        let config = MonitorConfig {
            token_pair: "LSK/USD".to_string(),
            contract_address: Address::repeat_byte(0x01),
        };
        let policy = StalenessPolicy {
            max_age: 3_600,
            alert: AlertPolicy::default(),
        };
        let monitor = StalenessMonitor::from_config(&config, &policy);
        assert_eq!(monitor.token_pair(), "LSK/USD");
        assert_eq!(monitor.contract_address(), Address::repeat_byte(0x01));

        let sample = StalenessSample {
            contract_address: monitor.contract_address(),
            token_pair: "LSK/USD".to_string(),
            answer: I256::ZERO,
            started_at: NOW - 3_601,
            updated_at: NOW - 3_601,
        };
        let StalenessVerdict::Stale { age, alert } = monitor.evaluate(&sample, NOW) else {
            panic!("expected stale verdict");
        };
        assert_eq!(age, 3_601);
        assert!(alert.message.ends_with("older than 1 hour."));
    }
}
