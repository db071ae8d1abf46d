use crate::error::FetchError;
use folio_core::types::{AuxiliaryMetadata, Extracted};
use regex::Regex;
use serde_json::Value;

/// Reads a JSON number, or a string holding one, at `pointer`.
pub fn number_at(json: &Value, pointer: &str) -> Result<f64, FetchError> {
    match json.pointer(pointer) {
        None | Some(Value::Null) => Err(FetchError::MissingField(pointer.to_string())),
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| FetchError::NotNumeric {
            field: pointer.to_string(),
            raw: n.to_string(),
        }),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| FetchError::NotNumeric {
            field: pointer.to_string(),
            raw: s.clone(),
        }),
        Some(other) => Err(FetchError::NotNumeric {
            field: pointer.to_string(),
            raw: other.to_string(),
        }),
    }
}

fn string_at(json: &Value, pointer: &str) -> Option<String> {
    json.pointer(pointer)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Quote API v7 shape: `quoteResponse.result[0]`.
pub fn extract_quote_v7(json: &Value) -> Result<Extracted, FetchError> {
    let value = number_at(json, "/quoteResponse/result/0/regularMarketPrice")?;
    let metadata = AuxiliaryMetadata {
        symbol: string_at(json, "/quoteResponse/result/0/symbol"),
        market_state: string_at(json, "/quoteResponse/result/0/marketState"),
        exchange: string_at(json, "/quoteResponse/result/0/fullExchangeName")
            .or_else(|| string_at(json, "/quoteResponse/result/0/exchange")),
        currency: string_at(json, "/quoteResponse/result/0/currency"),
    };
    Ok(Extracted { value, metadata })
}

/// Chart API v8 shape: `chart.result[0].meta`.
pub fn extract_chart_v8(json: &Value) -> Result<Extracted, FetchError> {
    let value = number_at(json, "/chart/result/0/meta/regularMarketPrice")?;
    let metadata = AuxiliaryMetadata {
        symbol: string_at(json, "/chart/result/0/meta/symbol"),
        market_state: string_at(json, "/chart/result/0/meta/marketState"),
        exchange: string_at(json, "/chart/result/0/meta/fullExchangeName")
            .or_else(|| string_at(json, "/chart/result/0/meta/exchangeName")),
        currency: string_at(json, "/chart/result/0/meta/currency"),
    };
    Ok(Extracted { value, metadata })
}

/// A labelled regular expression whose first capture group holds the number.
#[derive(Debug, Clone)]
pub struct HtmlPattern {
    pub label: String,
    pub regex: Regex,
}

impl HtmlPattern {
    pub fn new(label: &str, pattern: &str) -> anyhow::Result<Self> {
        Ok(Self {
            label: label.to_string(),
            regex: Regex::new(pattern)?,
        })
    }

    pub fn extract(&self, html: &str) -> Result<Extracted, FetchError> {
        let caps = self
            .regex
            .captures(html)
            .ok_or_else(|| FetchError::MissingField(format!("pattern '{}'", self.label)))?;
        let raw = caps
            .get(1)
            .map(|m| m.as_str())
            .ok_or_else(|| FetchError::MissingField(format!("pattern '{}' group 1", self.label)))?;
        raw.parse::<f64>()
            .map(Extracted::bare)
            .map_err(|_| FetchError::NotNumeric {
                field: self.label.clone(),
                raw: raw.to_string(),
            })
    }
}

/// Patterns tried in order against the valuation page.
pub fn buffett_patterns() -> anyhow::Result<Vec<HtmlPattern>> {
    Ok(vec![
        HtmlPattern::new("autoRatio variable", r"autoRatio\s*=\s*([0-9]+(?:\.[0-9]+)?)")?,
        HtmlPattern::new(
            "indicator text",
            r"(?i)Buffett Indicator[^0-9]{0,80}([0-9]+(?:\.[0-9]+)?)\s*%",
        )?,
        HtmlPattern::new(
            "percent of GDP",
            r"(?i)([0-9]+(?:\.[0-9]+)?)\s*%\s*of\s*GDP",
        )?,
    ])
}
