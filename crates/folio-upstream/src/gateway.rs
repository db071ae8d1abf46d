use anyhow::Context;
use folio_core::envelope::{BuffettEnvelope, GatewayReply, VixEnvelope};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:3001";

/// Dashboard-side client for the gateway endpoints.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get_reply<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Polling {}", url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Gateway unreachable at {}", url))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body from {}", url))?;
        let reply: GatewayReply<T> = serde_json::from_str(&body)
            .with_context(|| format!("Unexpected body from {} (HTTP {})", url, status))?;
        match reply {
            GatewayReply::Ok(value) => Ok(value),
            GatewayReply::Failed(failure) => Err(anyhow::anyhow!(
                "{}: {} (HTTP {})",
                failure.error,
                failure.message,
                status.as_u16()
            )),
        }
    }

    pub async fn vix(&self) -> anyhow::Result<VixEnvelope> {
        self.get_reply("/api/vix").await
    }

    pub async fn buffett_indicator(&self) -> anyhow::Result<BuffettEnvelope> {
        self.get_reply("/api/buffett-indicator").await
    }

    pub async fn health(&self) -> anyhow::Result<Value> {
        let url = format!("{}/api/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Gateway unreachable at {}", url))?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}
