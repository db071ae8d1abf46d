//! Display-only allocation hints derived from a Buffett Indicator reading.
//!
//! Two schemes coexist and are kept separate on purpose: the integer ratio
//! shown next to the gateway reading and the percentage split used by the
//! allocation panel. They do not share thresholds.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatioBucket {
    Conservative,
    Balanced,
    Aggressive,
}

impl RatioBucket {
    /// Integer ratio reported as `investmentRatio`.
    pub fn ratio(&self) -> u8 {
        match self {
            RatioBucket::Conservative => 1,
            RatioBucket::Balanced => 2,
            RatioBucket::Aggressive => 3,
        }
    }
}

/// Three-bucket classification. Both 100 and 200 land in `Balanced`.
pub fn investment_ratio(value: f64) -> Option<RatioBucket> {
    if !value.is_finite() {
        return None;
    }
    let bucket = if value > 200.0 {
        RatioBucket::Conservative
    } else if value >= 100.0 {
        RatioBucket::Balanced
    } else {
        RatioBucket::Aggressive
    };
    Some(bucket)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EquityAllocation {
    pub equity_pct: u8,
    pub cash_pct: u8,
}

/// Four-bucket percentage split between equities and cash.
pub fn equity_allocation(value: f64) -> Option<EquityAllocation> {
    if !value.is_finite() {
        return None;
    }
    let equity_pct = if value >= 200.0 {
        20
    } else if value >= 150.0 {
        40
    } else if value >= 100.0 {
        60
    } else {
        80
    };
    Some(EquityAllocation {
        equity_pct,
        cash_pct: 100 - equity_pct,
    })
}

/// Both schemes evaluated for one reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedInvestmentRatio {
    pub buffett_indicator: f64,
    pub bucket: RatioBucket,
    pub allocation: EquityAllocation,
}

impl DerivedInvestmentRatio {
    pub fn derive(value: f64) -> Option<Self> {
        Some(Self {
            buffett_indicator: value,
            bucket: investment_ratio(value)?,
            allocation: equity_allocation(value)?,
        })
    }
}
