use folio_core::health::HealthReport;
use folio_upstream::sources::MarketSources;
use metrics_exporter_prometheus::PrometheusHandle;
use std::time::Instant;

/// Shared by every handler. Holds no per-request data: each request
/// fetches fresh values.
#[derive(Clone)]
pub struct AppState {
    pub sources: MarketSources,
    pub metrics: Option<PrometheusHandle>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(sources: MarketSources, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            sources,
            metrics,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn health(&self) -> HealthReport {
        HealthReport::now(self.uptime_seconds())
    }
}
