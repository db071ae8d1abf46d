//! JSON bodies exchanged between the gateway and the dashboard.

use crate::health::iso_timestamp;
use crate::ratio::investment_ratio;
use crate::types::MarketIndicatorResult;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_VIX_SYMBOL: &str = "^VIX";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VixMetadata {
    pub market_state: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VixEnvelope {
    pub success: bool,
    pub vix: f64,
    pub symbol: String,
    pub metadata: VixMetadata,
    pub source: String,
    pub timestamp: String,
}

impl VixEnvelope {
    pub fn from_result(result: &MarketIndicatorResult) -> Self {
        let meta = &result.auxiliary_metadata;
        Self {
            success: true,
            vix: result.value,
            symbol: meta
                .symbol
                .clone()
                .unwrap_or_else(|| DEFAULT_VIX_SYMBOL.to_string()),
            metadata: VixMetadata {
                market_state: meta.market_state.clone(),
                exchange: meta.exchange.clone(),
                currency: meta.currency.clone(),
            },
            source: result.source_label.clone(),
            timestamp: fetched_at(result),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffettEnvelope {
    pub success: bool,
    pub buffett_indicator: f64,
    pub investment_ratio: u8,
    pub timestamp: String,
    pub source: String,
}

impl BuffettEnvelope {
    /// `None` only for a non-finite value, which a range-checked result
    /// never carries.
    pub fn from_result(result: &MarketIndicatorResult) -> Option<Self> {
        Some(Self {
            success: true,
            buffett_indicator: result.value,
            investment_ratio: investment_ratio(result.value)?.ratio(),
            timestamp: fetched_at(result),
            source: result.source_label.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEnvelope {
    pub success: bool,
    pub error: String,
    pub message: String,
}

impl FailureEnvelope {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: message.into(),
        }
    }
}

/// What a client reads back from an indicator endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum GatewayReply<T> {
    Ok(T),
    Failed(FailureEnvelope),
}

fn fetched_at(result: &MarketIndicatorResult) -> String {
    let ts = Utc
        .timestamp_millis_opt(result.fetched_at_epoch_millis)
        .single()
        .unwrap_or_else(Utc::now);
    iso_timestamp(ts)
}
