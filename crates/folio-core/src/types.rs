use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Open `(min, max)` interval a freshly parsed value must fall into before
/// it is accepted as a reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibilityRange {
    pub min: f64,
    pub max: f64,
}

impl PlausibilityRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value > self.min && value < self.max
    }
}

pub const VIX_RANGE: PlausibilityRange = PlausibilityRange::new(5.0, 100.0);
pub const BUFFETT_RANGE: PlausibilityRange = PlausibilityRange::new(50.0, 500.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndicatorKind {
    Vix,
    BuffettIndicator,
}

impl IndicatorKind {
    pub fn range(&self) -> PlausibilityRange {
        match self {
            IndicatorKind::Vix => VIX_RANGE,
            IndicatorKind::BuffettIndicator => BUFFETT_RANGE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndicatorKind::Vix => "vix",
            IndicatorKind::BuffettIndicator => "buffett-indicator",
        }
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort fields some upstreams report alongside the value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuxiliaryMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// A raw number pulled out of an upstream response, not yet range-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub value: f64,
    pub metadata: AuxiliaryMetadata,
}

impl Extracted {
    pub fn bare(value: f64) -> Self {
        Self {
            value,
            metadata: AuxiliaryMetadata::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketIndicatorResult {
    pub kind: IndicatorKind,
    pub value: f64,
    pub source_label: String,
    pub fetched_at_epoch_millis: i64,
    pub auxiliary_metadata: AuxiliaryMetadata,
}

impl MarketIndicatorResult {
    /// Builds a result only when `extracted.value` lies inside the range for
    /// `kind`. Out-of-range and non-finite values yield `None`.
    pub fn accept(kind: IndicatorKind, source_label: &str, extracted: Extracted) -> Option<Self> {
        if !kind.range().contains(extracted.value) {
            return None;
        }
        Some(Self {
            kind,
            value: extracted.value,
            source_label: source_label.to_string(),
            fetched_at_epoch_millis: Utc::now().timestamp_millis(),
            auxiliary_metadata: extracted.metadata,
        })
    }
}
