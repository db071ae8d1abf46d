use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

pub const SERVICE_NAME: &str = "folio-market-gateway";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
}

/// Liveness payload. It never depends on upstream reachability.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: String,
    pub service: &'static str,
    pub uptime_seconds: u64,
}

impl HealthReport {
    pub fn now(uptime_seconds: u64) -> Self {
        Self::at(Utc::now(), uptime_seconds)
    }

    pub fn at(ts: DateTime<Utc>, uptime_seconds: u64) -> Self {
        Self {
            status: HealthStatus::Ok,
            timestamp: iso_timestamp(ts),
            service: SERVICE_NAME,
            uptime_seconds,
        }
    }
}

/// Millisecond-precision RFC 3339 with a `Z` suffix, the format the client
/// already parses.
pub fn iso_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
