use crate::config::GatewayConfig;
use crate::metrics;
use crate::state::AppState;
use crate::static_ui;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use folio_core::envelope::{BuffettEnvelope, FailureEnvelope, VixEnvelope};
use folio_core::types::IndicatorKind;
use std::time::Instant;
use tower_http::trace::TraceLayer;
use tracing::error;

/// API routes only, without CORS or static serving.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/vix", get(vix_handler))
        .route("/api/buffett-indicator", get(buffett_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Full application: API routes, CORS for the configured origins, request
/// tracing, and the bundle with SPA fallback in production.
pub fn app(config: &GatewayConfig, state: AppState) -> Router {
    let api = router(state);
    let app = if config.serves_static() {
        api.fallback_service(static_ui::spa_service(&config.static_dir))
    } else {
        api.route("/", get(|| async { Html(static_ui::DEV_INDEX_HTML) }))
    };
    app.layer(config.cors_layer()).layer(TraceLayer::new_for_http())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health())
}

fn failure(error: &str, message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(FailureEnvelope::new(error, message)),
    )
        .into_response()
}

async fn vix_handler(State(state): State<AppState>) -> Response {
    let kind = IndicatorKind::Vix;
    let started = Instant::now();
    let outcome = state.sources.vix.fetch().await;
    metrics::record_latency(kind, started.elapsed().as_secs_f64() * 1000.0);

    match outcome {
        Ok(result) => {
            metrics::record_fetch_success(kind, &result.source_label);
            Json(VixEnvelope::from_result(&result)).into_response()
        }
        Err(e) => {
            error!("VIX request failed: {}", e);
            metrics::record_fetch_failure(kind, &e);
            failure("Failed to fetch VIX data", "All fetch methods failed")
        }
    }
}

async fn buffett_handler(State(state): State<AppState>) -> Response {
    let kind = IndicatorKind::BuffettIndicator;
    let started = Instant::now();
    let outcome = state.sources.buffett.fetch().await;
    metrics::record_latency(kind, started.elapsed().as_secs_f64() * 1000.0);

    let envelope = match outcome {
        Ok(result) => {
            metrics::record_fetch_success(kind, &result.source_label);
            BuffettEnvelope::from_result(&result)
        }
        Err(e) => {
            error!("Buffett Indicator request failed: {}", e);
            metrics::record_fetch_failure(kind, &e);
            None
        }
    };
    match envelope {
        Some(envelope) => Json(envelope).into_response(),
        None => failure(
            "Failed to fetch Buffett Indicator",
            "Could not extract value from page",
        ),
    }
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::OK, String::from("# metrics recorder not installed\n")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Mode, DEV_ORIGINS};
    use axum::body::Body;
    use axum::http::{header, Request};
    use folio_upstream::sources::{MarketSources, UpstreamConfig};
    use mockito::Matcher;
    use serde_json::Value;
    use std::path::PathBuf;
    use std::time::Duration;
    use tower::ServiceExt;

    fn upstream_for(server: &mockito::Server) -> UpstreamConfig {
        UpstreamConfig {
            vix_quote_url: format!("{}/v7/finance/quote?symbols=%5EVIX", server.url()),
            vix_chart_url: format!("{}/v8/finance/chart/VIX", server.url()),
            buffett_page_url: format!("{}/buffett", server.url()),
            timeout: Duration::from_secs(5),
        }
    }

    fn gateway_config(mode: Mode, upstream: UpstreamConfig, static_dir: PathBuf) -> GatewayConfig {
        GatewayConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            mode,
            cors_origins: vec!["https://folio.example".to_string()],
            static_dir,
            upstream,
        }
    }

    fn test_app(config: &GatewayConfig) -> Router {
        let sources = MarketSources::from_config(&config.upstream).unwrap();
        app(config, AppState::new(sources, None))
    }

    async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_vix_quote_api_envelope() {
        let mut server = mockito::Server::new_async().await;
        let _quote = server
            .mock("GET", "/v7/finance/quote")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"quoteResponse":{"result":[{"regularMarketPrice":22.5,"symbol":"^VIX"}],"error":null}}"#)
            .create_async()
            .await;

        let config = gateway_config(Mode::Development, upstream_for(&server), PathBuf::from("dist"));
        let (status, body) = get(&test_app(&config), "/api/vix").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["vix"], 22.5);
        assert_eq!(json["symbol"], "^VIX");
        assert_eq!(json["source"], "Quote API (v7)");
    }

    #[tokio::test]
    async fn test_buffett_envelope() {
        let mut server = mockito::Server::new_async().await;
        let _page = server
            .mock("GET", "/buffett")
            .with_status(200)
            .with_body("<script>var autoRatio = 137.4;</script>")
            .create_async()
            .await;

        let config = gateway_config(Mode::Development, upstream_for(&server), PathBuf::from("dist"));
        let (status, body) = get(&test_app(&config), "/api/buffett-indicator").await;
        assert_eq!(status, StatusCode::OK);

        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["buffettIndicator"], 137.4);
        assert_eq!(json["investmentRatio"], 2);
        assert!(json["timestamp"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_all_upstreams_down_health_still_ok() {
        let mut server = mockito::Server::new_async().await;
        let _quote = server
            .mock("GET", "/v7/finance/quote")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let _chart = server
            .mock("GET", "/v8/finance/chart/VIX")
            .with_status(502)
            .create_async()
            .await;
        let _page = server
            .mock("GET", "/buffett")
            .with_status(403)
            .create_async()
            .await;

        let config = gateway_config(Mode::Development, upstream_for(&server), PathBuf::from("dist"));
        let app = test_app(&config);

        for path in ["/api/vix", "/api/buffett-indicator"] {
            let (status, body) = get(&app, path).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            let json: Value = serde_json::from_str(&body).unwrap();
            assert_eq!(json["success"], false);
            assert!(!json["message"].as_str().unwrap().is_empty());
            assert!(!json["error"].as_str().unwrap().is_empty());
        }

        let (status, body) = get(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["service"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_cors_allowlist() {
        let server = mockito::Server::new_async().await;
        let config = gateway_config(Mode::Development, upstream_for(&server), PathBuf::from("dist"));
        let app = test_app(&config);

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header(header::ORIGIN, DEV_ORIGINS[0])
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            allowed.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            DEV_ORIGINS[0]
        );

        let refused = app
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header(header::ORIGIN, "https://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(refused.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }

    #[tokio::test]
    async fn test_production_serves_bundle_with_fallback() {
        let server = mockito::Server::new_async().await;
        let dist = tempfile::tempdir().unwrap();
        std::fs::write(dist.path().join("index.html"), "<div id=\"root\"></div>").unwrap();
        std::fs::create_dir_all(dist.path().join("assets")).unwrap();
        std::fs::write(dist.path().join("assets/app.js"), "console.log(1)").unwrap();

        let config = gateway_config(Mode::Production, upstream_for(&server), dist.path().to_path_buf());
        let app = test_app(&config);

        let (status, body) = get(&app, "/assets/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "console.log(1)");

        let (status, body) = get(&app, "/projects/some-client-route").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("root"));

        let (status, _) = get(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_development_index_page() {
        let server = mockito::Server::new_async().await;
        let config = gateway_config(Mode::Development, upstream_for(&server), PathBuf::from("dist"));
        let (status, body) = get(&test_app(&config), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/api/buffett-indicator"));
    }

    #[tokio::test]
    async fn test_metrics_without_recorder() {
        let server = mockito::Server::new_async().await;
        let config = gateway_config(Mode::Development, upstream_for(&server), PathBuf::from("dist"));
        let (status, body) = get(&test_app(&config), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with('#'));
    }
}
