use alloy::primitives::{Address, Bytes};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use feed_keeper_core::EthCall;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument};

#[derive(Deserialize, Debug)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize, Debug)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Minimal JSON-RPC client issuing `eth_call` against the latest block.
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(http: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl EthCall for JsonRpcClient {
    #[instrument(skip(self, data), level = "debug", fields(endpoint = %self.endpoint))]
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_call",
            "params": [
                { "to": to.to_string(), "data": format!("0x{}", hex::encode(&data)) },
                "latest"
            ],
        });

        let response: RpcResponse = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach RPC endpoint {}", self.endpoint))?
            .error_for_status()
            .context("RPC endpoint returned an error status")?
            .json()
            .await
            .context("Failed to parse JSON-RPC response")?;

        if let Some(err) = response.error {
            return Err(match err.data {
                Some(data) => anyhow!("RPC error {}: {} ({})", err.code, err.message, data),
                None => anyhow!("RPC error {}: {}", err.code, err.message),
            });
        }

        let result = response
            .result
            .ok_or_else(|| anyhow!("JSON-RPC response has neither result nor error"))?;
        let raw = hex::decode(result.trim_start_matches("0x"))
            .with_context(|| format!("eth_call returned invalid hex: {}", result))?;
        debug!(id, bytes = raw.len(), "eth_call returned");
        Ok(Bytes::from(raw))
    }
}
