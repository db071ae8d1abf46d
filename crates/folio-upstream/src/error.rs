use folio_core::types::IndicatorKind;
use serde::Serialize;
use thiserror::Error;

/// Why one candidate did not yield a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateFailure {
    pub label: String,
    pub reason: String,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("response from {url} is not valid JSON: {reason}")]
    Decode { url: String, reason: String },

    #[error("field '{0}' missing from response")]
    MissingField(String),

    #[error("field '{field}' is not numeric: {raw}")]
    NotNumeric { field: String, raw: String },

    #[error("value {value} outside plausible range ({min}, {max})")]
    OutOfRange { value: f64, min: f64, max: f64 },

    #[error("all fetch methods failed for {kind} ({} attempts)", .attempts.len())]
    Exhausted {
        kind: IndicatorKind,
        attempts: Vec<CandidateFailure>,
    },
}

impl FetchError {
    /// True for failures the chain recovers from by moving to the next
    /// candidate.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FetchError::Exhausted { .. })
    }
}
