use alloy::primitives::Address;
use anyhow::{Context, Result};
use feed_keeper_core::{
    types::{AttestedPackage, AttestedPricePoint, Price},
    FeedId, PayloadDecoder,
};
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SignedDataPackage {
    timestamp_milliseconds: u64,
    signer_address: String,
    data_points: Vec<DataPoint>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DataPoint {
    data_feed_id: String,
    value: PointValue,
}

/// Scaled integer value; strings carry values beyond JSON number precision.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum PointValue {
    Text(String),
    Number(u64),
}

impl PointValue {
    fn to_price(&self) -> Result<Price> {
        match self {
            PointValue::Text(s) => s
                .trim()
                .parse::<Price>()
                .with_context(|| format!("Invalid price value: {:?}", s)),
            PointValue::Number(n) => Ok(Price::from(*n)),
        }
    }
}

/// Decodes a JSON array of already verified data packages.
///
/// Each package looks like
/// `{"timestampMilliseconds": .., "signerAddress": "0x..", "dataPoints": [..]}`
/// where a point is `{"dataFeedId": "ETH", "value": "300000000000"}` with the
/// value already scaled by `10^8`. Package and point order is kept. Points whose
/// id does not fit a feed id are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonPackageDecoder;

impl PayloadDecoder for JsonPackageDecoder {
    fn decode(&self, raw: &[u8]) -> Result<Vec<AttestedPackage>> {
        let packages: Vec<SignedDataPackage> =
            serde_json::from_slice(raw).context("Failed to parse data packages JSON")?;

        packages
            .into_iter()
            .enumerate()
            .map(|(index, package)| -> Result<AttestedPackage> {
                let signer = Address::from_str(&package.signer_address).with_context(|| {
                    format!("Invalid signer address in package {}", index)
                })?;
                let mut points = Vec::with_capacity(package.data_points.len());
                for point in &package.data_points {
                    // Such an id can never match a tracked feed.
                    let Ok(feed_id) = FeedId::from_symbol(&point.data_feed_id) else {
                        debug!(
                            package = index,
                            data_feed_id = %point.data_feed_id,
                            "Skipping data point with unpackable feed id"
                        );
                        continue;
                    };
                    let value = point
                        .value
                        .to_price()
                        .with_context(|| format!("Invalid data point in package {}", index))?;
                    points.push(AttestedPricePoint { feed_id, value });
                }
                Ok(AttestedPackage {
                    timestamp_ms: package.timestamp_milliseconds,
                    signer,
                    points,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_packages() {
        let raw = br#"[
            {
                "timestampMilliseconds": 1700000000000,
                "signerAddress": "0x8BB8F32Df04c8b654987DAaeD53D6B6091e3B774",
                "dataPoints": [
                    {"dataFeedId": "ETH", "value": "300012345678"},
                    {"dataFeedId": "BTC", "value": 6000000000000}
                ]
            },
            {
                "timestampMilliseconds": 1700000000000,
                "signerAddress": "0xdEB22f54738d54976C4c0fe5ce6d408E40d88499",
                "dataPoints": [{"dataFeedId": "ETH", "value": "300000000000"}]
            }
        ]"#;

        let packages = JsonPackageDecoder.decode(raw).unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].timestamp_ms, 1_700_000_000_000);
        assert_eq!(
            packages[0].signer,
            Address::from_str("0x8BB8F32Df04c8b654987DAaeD53D6B6091e3B774").unwrap()
        );
        assert_eq!(packages[0].points[0].feed_id, FeedId::from_symbol("ETH").unwrap());
        assert_eq!(packages[0].points[0].value, 300_012_345_678);
        assert_eq!(packages[0].points[1].value, 6_000_000_000_000);
        assert_eq!(packages[1].points[0].value, 300_000_000_000);
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        let err = JsonPackageDecoder.decode(b"{not json").unwrap_err();
        assert!(err.to_string().contains("Failed to parse data packages JSON"));
    }

    #[test]
    fn test_decode_rejects_bad_value() {
        let raw = br#"[{
            "timestampMilliseconds": 1,
            "signerAddress": "0x8BB8F32Df04c8b654987DAaeD53D6B6091e3B774",
            "dataPoints": [{"dataFeedId": "ETH", "value": "3000.12"}]
        }]"#;
        let err = JsonPackageDecoder.decode(raw).unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid price value"));
    }

    #[test]
    fn test_decode_skips_unpackable_feed_ids() {
        let raw = br#"[{
            "timestampMilliseconds": 1,
            "signerAddress": "0x8BB8F32Df04c8b654987DAaeD53D6B6091e3B774",
            "dataPoints": [
                {"dataFeedId": "SOME_VERY_LONG_FEED_IDENTIFIER_OVER_32", "value": "1"},
                {"dataFeedId": "BAD\u0000ID", "value": "2"},
                {"dataFeedId": "", "value": "3"},
                {"dataFeedId": "ETH", "value": "300000000000"}
            ]
        }]"#;
        let packages = JsonPackageDecoder.decode(raw).unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(
            packages[0].points,
            vec![AttestedPricePoint {
                feed_id: FeedId::from_symbol("ETH").unwrap(),
                value: 300_000_000_000,
            }]
        );
    }

    #[test]
    fn test_decode_rejects_bad_signer() {
        let raw = br#"[{
            "timestampMilliseconds": 1,
            "signerAddress": "signer-1",
            "dataPoints": []
        }]"#;
        let err = JsonPackageDecoder.decode(raw).unwrap_err();
        assert!(err.to_string().contains("Invalid signer address in package 0"));
    }
}
