use crate::chain::{first_plausible, Candidate, JsonCandidate, PatternCandidate};
use crate::client::{build_http_client, get_text, DEFAULT_TIMEOUT};
use crate::error::{CandidateFailure, FetchError};
use crate::parser::{buffett_patterns, extract_chart_v8, extract_quote_v7, HtmlPattern};
use folio_core::types::{IndicatorKind, MarketIndicatorResult};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub const VIX_QUOTE_V7_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote?symbols=%5EVIX";
pub const VIX_CHART_V8_URL: &str =
    "https://query2.finance.yahoo.com/v8/finance/chart/%5EVIX?interval=1d&range=1d";
pub const BUFFETT_PAGE_URL: &str =
    "https://www.currentmarketvaluation.com/models/buffett-indicator.php";

pub const QUOTE_V7_LABEL: &str = "Quote API (v7)";
pub const CHART_V8_LABEL: &str = "Chart API (v8)";

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub vix_quote_url: String,
    pub vix_chart_url: String,
    pub buffett_page_url: String,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            vix_quote_url: VIX_QUOTE_V7_URL.to_string(),
            vix_chart_url: VIX_CHART_V8_URL.to_string(),
            buffett_page_url: BUFFETT_PAGE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Two quote APIs tried in order.
#[derive(Clone)]
pub struct VixFetcher {
    client: Client,
    quote_url: String,
    chart_url: String,
}

impl VixFetcher {
    pub fn new(client: Client, quote_url: impl Into<String>, chart_url: impl Into<String>) -> Self {
        Self {
            client,
            quote_url: quote_url.into(),
            chart_url: chart_url.into(),
        }
    }

    fn candidates(&self) -> Vec<Box<dyn Candidate>> {
        vec![
            Box::new(JsonCandidate::new(
                QUOTE_V7_LABEL,
                self.client.clone(),
                self.quote_url.clone(),
                extract_quote_v7,
            )),
            Box::new(JsonCandidate::new(
                CHART_V8_LABEL,
                self.client.clone(),
                self.chart_url.clone(),
                extract_chart_v8,
            )),
        ]
    }

    pub async fn fetch(&self) -> Result<MarketIndicatorResult, FetchError> {
        first_plausible(IndicatorKind::Vix, &self.candidates()).await
    }
}

/// One page fetch, then every pattern against the same body.
#[derive(Clone)]
pub struct BuffettFetcher {
    client: Client,
    page_url: String,
    patterns: Arc<Vec<HtmlPattern>>,
}

impl BuffettFetcher {
    pub fn new(client: Client, page_url: impl Into<String>, patterns: Vec<HtmlPattern>) -> Self {
        Self {
            client,
            page_url: page_url.into(),
            patterns: Arc::new(patterns),
        }
    }

    pub async fn fetch(&self) -> Result<MarketIndicatorResult, FetchError> {
        let kind = IndicatorKind::BuffettIndicator;
        let html: Arc<str> = match get_text(&self.client, &self.page_url).await {
            Ok(body) => body.into(),
            Err(e) => {
                warn!("{} page fetch failed: {}", kind, e);
                return Err(FetchError::Exhausted {
                    kind,
                    attempts: vec![CandidateFailure {
                        label: "page fetch".to_string(),
                        reason: e.to_string(),
                    }],
                });
            }
        };

        let candidates: Vec<Box<dyn Candidate>> = self
            .patterns
            .iter()
            .map(|p| Box::new(PatternCandidate::new(p.clone(), html.clone())) as Box<dyn Candidate>)
            .collect();
        first_plausible(kind, &candidates).await
    }
}

/// Both fetchers sharing one HTTP client.
#[derive(Clone)]
pub struct MarketSources {
    pub vix: VixFetcher,
    pub buffett: BuffettFetcher,
}

impl MarketSources {
    pub fn from_config(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = build_http_client(config.timeout)?;
        Ok(Self {
            vix: VixFetcher::new(client.clone(), &config.vix_quote_url, &config.vix_chart_url),
            buffett: BuffettFetcher::new(client, &config.buffett_page_url, buffett_patterns()?),
        })
    }
}
