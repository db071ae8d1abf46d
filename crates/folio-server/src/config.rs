use axum::http::{HeaderValue, Method};
use clap::{Args, ValueEnum};
use folio_upstream::client::DEFAULT_TIMEOUT;
use folio_upstream::sources::{UpstreamConfig, BUFFETT_PAGE_URL, VIX_CHART_V8_URL, VIX_QUOTE_V7_URL};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

pub const DEV_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Development,
    Production,
}

#[derive(Debug, Clone, Args)]
pub struct UpstreamArgs {
    /// Quote API endpoint tried first for the VIX
    #[arg(long, env = "VIX_QUOTE_URL", default_value = VIX_QUOTE_V7_URL)]
    pub vix_quote_url: String,
    /// Chart API endpoint tried second for the VIX
    #[arg(long, env = "VIX_CHART_URL", default_value = VIX_CHART_V8_URL)]
    pub vix_chart_url: String,
    /// Page scraped for the Buffett Indicator
    #[arg(long, env = "BUFFETT_PAGE_URL", default_value = BUFFETT_PAGE_URL)]
    pub buffett_page_url: String,
    /// Per-request upstream timeout in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT.as_secs())]
    pub upstream_timeout_secs: u64,
}

impl UpstreamArgs {
    pub fn to_config(&self) -> UpstreamConfig {
        UpstreamConfig {
            vix_quote_url: self.vix_quote_url.clone(),
            vix_chart_url: self.vix_chart_url.clone(),
            buffett_page_url: self.buffett_page_url.clone(),
            timeout: Duration::from_secs(self.upstream_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub addr: SocketAddr,
    pub mode: Mode,
    /// Production allowlist. Development always uses [`DEV_ORIGINS`].
    pub cors_origins: Vec<String>,
    pub static_dir: PathBuf,
    pub upstream: UpstreamConfig,
}

impl GatewayConfig {
    pub fn allowed_origins(&self) -> Vec<String> {
        match self.mode {
            Mode::Development => DEV_ORIGINS.iter().map(|s| s.to_string()).collect(),
            Mode::Production => self.cors_origins.clone(),
        }
    }

    pub fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .allowed_origins()
            .iter()
            .filter_map(|origin| match origin.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin '{}'", origin);
                    None
                }
            })
            .collect();
        if origins.is_empty() {
            warn!("No CORS origins configured; cross-origin requests will be refused");
        }
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::OPTIONS])
            .max_age(Duration::from_secs(3600))
    }

    pub fn serves_static(&self) -> bool {
        self.mode == Mode::Production
    }
}
