use anyhow::Context;
use folio_core::types::IndicatorKind;
use folio_upstream::error::{CandidateFailure, FetchError};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus metrics recorder")
}

pub fn record_fetch_success(kind: IndicatorKind, source: &str) {
    counter!("gateway_fetch_success_total", "indicator" => kind.as_str(), "source" => source.to_string())
        .increment(1);
}

pub fn record_fetch_failure(kind: IndicatorKind, err: &FetchError) {
    counter!("gateway_fetch_exhausted_total", "indicator" => kind.as_str()).increment(1);
    if let FetchError::Exhausted { attempts, .. } = err {
        record_rejections(kind, attempts);
    }
}

fn record_rejections(kind: IndicatorKind, attempts: &[CandidateFailure]) {
    for attempt in attempts {
        counter!("gateway_candidate_rejected_total", "indicator" => kind.as_str(), "candidate" => attempt.label.clone())
            .increment(1);
    }
}

pub fn record_latency(kind: IndicatorKind, latency_ms: f64) {
    histogram!("gateway_fetch_latency_ms", "indicator" => kind.as_str()).record(latency_ms);
}
