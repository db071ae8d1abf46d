//! Dashboard polling. Each indicator has its own task and schedule; a
//! failed poll clears that indicator instead of keeping a stale value.

use crate::gateway::GatewayClient;
use async_trait::async_trait;
use folio_core::envelope::{BuffettEnvelope, VixEnvelope};
use chrono::{DateTime, Utc};
use folio_core::oplog::OpLog;
use folio_core::ratio::DerivedInvestmentRatio;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VixReading {
    pub value: f64,
    pub symbol: String,
    pub source: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuffettReading {
    pub value: f64,
    pub investment_ratio: u8,
    pub derived: Option<DerivedInvestmentRatio>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub vix: Option<VixReading>,
    pub buffett: Option<BuffettReading>,
    pub simulated_buffett: Option<f64>,
}

impl DashboardSnapshot {
    /// The simulated value wins over the fetched one while it is set.
    pub fn effective_buffett(&self) -> Option<f64> {
        self.simulated_buffett
            .or_else(|| self.buffett.as_ref().map(|b| b.value))
    }

    pub fn effective_ratio(&self) -> Option<DerivedInvestmentRatio> {
        self.effective_buffett().and_then(DerivedInvestmentRatio::derive)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTarget {
    Vix,
    Buffett,
    All,
}

/// Where the poller reads indicator envelopes from.
#[async_trait]
pub trait IndicatorFeed: Send + Sync + 'static {
    async fn vix(&self) -> anyhow::Result<VixEnvelope>;
    async fn buffett_indicator(&self) -> anyhow::Result<BuffettEnvelope>;
}

#[async_trait]
impl IndicatorFeed for GatewayClient {
    async fn vix(&self) -> anyhow::Result<VixEnvelope> {
        GatewayClient::vix(self).await
    }

    async fn buffett_indicator(&self) -> anyhow::Result<BuffettEnvelope> {
        GatewayClient::buffett_indicator(self).await
    }
}

type Ack = oneshot::Sender<()>;

#[derive(Clone)]
pub struct PollerHandle {
    vix_tx: mpsc::Sender<Ack>,
    buffett_tx: mpsc::Sender<Ack>,
    snapshot_tx: Arc<watch::Sender<DashboardSnapshot>>,
    snapshot_rx: watch::Receiver<DashboardSnapshot>,
}

impl PollerHandle {
    /// Polls right away and waits until the targeted tasks have published.
    pub async fn refresh(&self, target: RefreshTarget) -> anyhow::Result<()> {
        let mut pending = Vec::new();
        if matches!(target, RefreshTarget::Vix | RefreshTarget::All) {
            pending.push(request(&self.vix_tx).await?);
        }
        if matches!(target, RefreshTarget::Buffett | RefreshTarget::All) {
            pending.push(request(&self.buffett_tx).await?);
        }
        for ack in pending {
            ack.await
                .map_err(|_| anyhow::anyhow!("poller task dropped refresh"))?;
        }
        Ok(())
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardSnapshot> {
        self.snapshot_rx.clone()
    }

    pub fn set_simulated_buffett(&self, value: Option<f64>) {
        self.snapshot_tx
            .send_modify(|snapshot| snapshot.simulated_buffett = value);
    }
}

async fn request(tx: &mpsc::Sender<Ack>) -> anyhow::Result<oneshot::Receiver<()>> {
    let (ack_tx, ack_rx) = oneshot::channel();
    tx.send(ack_tx)
        .await
        .map_err(|_| anyhow::anyhow!("poller task has stopped"))?;
    Ok(ack_rx)
}

async fn poll_vix<F: IndicatorFeed>(client: &F, snapshot: &watch::Sender<DashboardSnapshot>, oplog: &OpLog) {
    let reading = match client.vix().await {
        Ok(env) => {
            info!("VIX {} from {}", env.vix, env.source);
            Some(VixReading {
                value: env.vix,
                symbol: env.symbol,
                source: env.source,
                received_at: Utc::now(),
            })
        }
        Err(e) => {
            warn!("VIX fetch failed: {:#}", e);
            oplog.error(format!("VIX fetch failed: {:#}", e)).await;
            None
        }
    };
    snapshot.send_modify(|s| s.vix = reading);
}

async fn poll_buffett<F: IndicatorFeed>(client: &F, snapshot: &watch::Sender<DashboardSnapshot>, oplog: &OpLog) {
    let reading = match client.buffett_indicator().await {
        Ok(env) => {
            info!(
                "Buffett Indicator {} (ratio {})",
                env.buffett_indicator, env.investment_ratio
            );
            Some(BuffettReading {
                value: env.buffett_indicator,
                investment_ratio: env.investment_ratio,
                derived: DerivedInvestmentRatio::derive(env.buffett_indicator),
                received_at: Utc::now(),
            })
        }
        Err(e) => {
            warn!("Buffett Indicator fetch failed: {:#}", e);
            oplog
                .error(format!("Buffett Indicator fetch failed: {:#}", e))
                .await;
            None
        }
    };
    snapshot.send_modify(|s| s.buffett = reading);
}

#[derive(Debug, Clone, Copy)]
enum Indicator {
    Vix,
    Buffett,
}

async fn run_indicator<F: IndicatorFeed>(
    indicator: Indicator,
    client: F,
    snapshot: Arc<watch::Sender<DashboardSnapshot>>,
    oplog: OpLog,
    interval: Duration,
    mut refresh_rx: mpsc::Receiver<Ack>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        let ack = tokio::select! {
            _ = ticker.tick() => None,
            req = refresh_rx.recv() => match req {
                Some(ack) => Some(ack),
                None => break,
            },
        };
        match indicator {
            Indicator::Vix => poll_vix(&client, &snapshot, &oplog).await,
            Indicator::Buffett => poll_buffett(&client, &snapshot, &oplog).await,
        }
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }
}

/// Starts one polling task per indicator. The first poll happens
/// immediately, then every `interval`.
pub fn spawn_poller<F: IndicatorFeed + Clone>(
    client: F,
    interval: Duration,
    oplog: OpLog,
    simulated_buffett: Option<f64>,
) -> (PollerHandle, Vec<JoinHandle<()>>) {
    let (snapshot_tx, snapshot_rx) = watch::channel(DashboardSnapshot {
        simulated_buffett,
        ..Default::default()
    });
    let snapshot_tx = Arc::new(snapshot_tx);
    let (vix_tx, vix_rx) = mpsc::channel(4);
    let (buffett_tx, buffett_rx) = mpsc::channel(4);

    let tasks = vec![
        tokio::spawn(run_indicator(
            Indicator::Vix,
            client.clone(),
            snapshot_tx.clone(),
            oplog.clone(),
            interval,
            vix_rx,
        )),
        tokio::spawn(run_indicator(
            Indicator::Buffett,
            client,
            snapshot_tx.clone(),
            oplog,
            interval,
            buffett_rx,
        )),
    ];

    (
        PollerHandle {
            vix_tx,
            buffett_tx,
            snapshot_tx,
            snapshot_rx,
        },
        tasks,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::build_http_client;
    use folio_core::ratio::RatioBucket;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn vix_ok(value: f64) -> String {
        serde_json::json!({
            "success": true,
            "vix": value,
            "symbol": "^VIX",
            "metadata": {"marketState": "REGULAR", "exchange": null, "currency": "USD"},
            "source": "Quote API (v7)",
            "timestamp": "2024-03-01T12:00:00.000Z"
        })
        .to_string()
    }

    fn failure() -> String {
        serde_json::json!({
            "success": false,
            "error": "Failed to fetch Buffett Indicator",
            "message": "Could not extract value"
        })
        .to_string()
    }

    fn client_for(server: &mockito::Server) -> GatewayClient {
        GatewayClient::new(build_http_client(Duration::from_secs(5)).unwrap(), &server.url())
    }

    #[tokio::test]
    async fn test_success_and_failure_are_independent() {
        let mut server = mockito::Server::new_async().await;
        let _vix = server
            .mock("GET", "/api/vix")
            .with_status(200)
            .with_body(vix_ok(18.2))
            .expect_at_least(1)
            .create_async()
            .await;
        let _buffett = server
            .mock("GET", "/api/buffett-indicator")
            .with_status(500)
            .with_body(failure())
            .expect_at_least(1)
            .create_async()
            .await;

        let oplog = OpLog::new(10);
        let (poller, _tasks) = spawn_poller(client_for(&server), DEFAULT_POLL_INTERVAL, oplog.clone(), None);
        poller.refresh(RefreshTarget::All).await.unwrap();

        let snapshot = poller.snapshot();
        assert_eq!(snapshot.vix.as_ref().map(|v| v.value), Some(18.2));
        assert!(snapshot.buffett.is_none());
        let entries = oplog.recent(10).await;
        assert!(entries.iter().any(|e| e.message.contains("Could not extract value")));
    }

    #[tokio::test]
    async fn test_failure_clears_previous_value() {
        let mut server = mockito::Server::new_async().await;
        let good = server
            .mock("GET", "/api/buffett-indicator")
            .with_status(200)
            .with_body(
                serde_json::json!({
                    "success": true,
                    "buffettIndicator": 212.0,
                    "investmentRatio": 1,
                    "timestamp": "2024-03-01T12:00:00.000Z",
                    "source": "autoRatio variable"
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _vix = server
            .mock("GET", "/api/vix")
            .with_status(200)
            .with_body(vix_ok(18.2))
            .create_async()
            .await;

        let (poller, _tasks) = spawn_poller(client_for(&server), DEFAULT_POLL_INTERVAL, OpLog::default(), None);
        poller.refresh(RefreshTarget::Buffett).await.unwrap();
        let reading = poller.snapshot().buffett.unwrap();
        assert_eq!(reading.investment_ratio, 1);
        assert_eq!(reading.derived.unwrap().bucket, RatioBucket::Conservative);

        good.remove_async().await;
        let _bad = server
            .mock("GET", "/api/buffett-indicator")
            .with_status(500)
            .with_body(failure())
            .create_async()
            .await;
        poller.refresh(RefreshTarget::Buffett).await.unwrap();
        assert!(poller.snapshot().buffett.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_gateway_logs() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let client = GatewayClient::new(
            build_http_client(Duration::from_secs(2)).unwrap(),
            &format!("http://{}", addr),
        );
        let oplog = OpLog::default();
        let (poller, _tasks) = spawn_poller(client, DEFAULT_POLL_INTERVAL, oplog.clone(), None);
        poller.refresh(RefreshTarget::Vix).await.unwrap();
        assert!(poller.snapshot().vix.is_none());
        assert!(!oplog.is_empty().await);
    }

    #[derive(Clone, Default)]
    struct CountingFeed {
        vix_calls: Arc<AtomicUsize>,
        buffett_calls: Arc<AtomicUsize>,
    }

    impl CountingFeed {
        fn counts(&self) -> (usize, usize) {
            (
                self.vix_calls.load(Ordering::SeqCst),
                self.buffett_calls.load(Ordering::SeqCst),
            )
        }

        async fn settle(&self, expected: (usize, usize)) {
            for _ in 0..100 {
                if self.counts() == expected {
                    break;
                }
                tokio::task::yield_now().await;
            }
            assert_eq!(self.counts(), expected);
        }
    }

    #[async_trait]
    impl IndicatorFeed for CountingFeed {
        async fn vix(&self) -> anyhow::Result<VixEnvelope> {
            self.vix_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_str(&vix_ok(20.0))?)
        }

        async fn buffett_indicator(&self) -> anyhow::Result<BuffettEnvelope> {
            self.buffett_calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::from_value(serde_json::json!({
                "success": true,
                "buffettIndicator": 150.0,
                "investmentRatio": 2,
                "timestamp": "2024-03-01T12:00:00.000Z",
                "source": "autoRatio variable"
            }))?)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_indicator_polls_on_its_own_timer() {
        let feed = CountingFeed::default();
        let (poller, _tasks) = spawn_poller(feed.clone(), DEFAULT_POLL_INTERVAL, OpLog::default(), None);
        feed.settle((1, 1)).await;

        tokio::time::advance(DEFAULT_POLL_INTERVAL / 2).await;
        feed.settle((1, 1)).await;

        tokio::time::advance(DEFAULT_POLL_INTERVAL / 2).await;
        feed.settle((2, 2)).await;

        // A manual refresh does not shift the hourly schedule.
        poller.refresh(RefreshTarget::Vix).await.unwrap();
        assert_eq!(feed.counts(), (3, 2));

        tokio::time::advance(DEFAULT_POLL_INTERVAL).await;
        feed.settle((4, 3)).await;
        assert_eq!(poller.snapshot().buffett.map(|b| b.investment_ratio), Some(2));
    }

    #[test]
    fn test_simulated_value_overrides() {
        let snapshot = DashboardSnapshot {
            vix: None,
            buffett: Some(BuffettReading {
                value: 90.0,
                investment_ratio: 3,
                derived: DerivedInvestmentRatio::derive(90.0),
                received_at: Utc::now(),
            }),
            simulated_buffett: Some(250.0),
        };
        assert_eq!(snapshot.effective_buffett(), Some(250.0));
        assert_eq!(snapshot.effective_ratio().unwrap().bucket, RatioBucket::Conservative);

        let cleared = DashboardSnapshot {
            simulated_buffett: None,
            ..snapshot
        };
        assert_eq!(cleared.effective_ratio().unwrap().bucket, RatioBucket::Aggressive);
    }
}
