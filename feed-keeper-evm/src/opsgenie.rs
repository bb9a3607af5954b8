use anyhow::{Context, Result};
use async_trait::async_trait;
use feed_keeper_core::{AlertRequest, AlertSink};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use tracing::{debug, instrument};

pub const OPSGENIE_API_URL: &str = "https://api.opsgenie.com";

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct OpsgenieAlert<'a> {
    message: &'a str,
    description: &'a str,
    teams: Vec<Responder<'a>>,
    visible_to: Vec<Responder<'a>>,
    priority: String,
}

#[derive(Serialize, Debug)]
struct Responder<'a> {
    name: &'a str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct OpsgenieResponse {
    result: String,
    #[serde(default)]
    request_id: Option<String>,
}

impl<'a> From<&'a AlertRequest> for OpsgenieAlert<'a> {
    fn from(alert: &'a AlertRequest) -> Self {
        Self {
            message: &alert.message,
            description: &alert.description,
            teams: alert
                .routing
                .teams
                .iter()
                .map(|name| Responder { name, kind: None })
                .collect(),
            visible_to: alert
                .routing
                .visible_to
                .iter()
                .map(|name| Responder {
                    name,
                    kind: Some("team"),
                })
                .collect(),
            priority: alert.severity.to_string(),
        }
    }
}

/// Creates alerts through the Opsgenie Alert API (v2).
pub struct OpsgenieSink {
    http: reqwest::Client,
    host: String,
    api_key: String,
}

impl Debug for OpsgenieSink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsgenieSink")
            .field("host", &self.host)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl OpsgenieSink {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            host: host.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl AlertSink for OpsgenieSink {
    #[instrument(skip_all, fields(token_pair = %alert.token_pair))]
    async fn send(&self, alert: &AlertRequest) -> Result<String> {
        let body = OpsgenieAlert::from(alert);
        debug!(?body, "Creating Opsgenie alert");

        let response = self
            .http
            .post(format!("{}/v2/alerts", self.host))
            .header("Authorization", format!("GenieKey {}", self.api_key))
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach Opsgenie at {}", self.host))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Opsgenie rejected alert with status {}: {}", status, text);
        }

        let parsed: OpsgenieResponse = response
            .json()
            .await
            .context("Failed to parse Opsgenie response")?;
        Ok(match parsed.request_id {
            Some(id) => format!("{} (requestId: {})", parsed.result, id),
            None => parsed.result,
        })
    }
}
