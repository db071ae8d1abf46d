mod config;
mod http;
mod local;
mod metrics;
mod state;
mod static_ui;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use config::{GatewayConfig, Mode, UpstreamArgs};
use folio_core::envelope::{BuffettEnvelope, FailureEnvelope, VixEnvelope};
use folio_core::stopwatch::SystemClock;
use folio_core::store::PreferenceStore;
use folio_upstream::client::{build_http_client, DEFAULT_TIMEOUT};
use folio_upstream::gateway::{GatewayClient, DEFAULT_GATEWAY_URL};
use folio_upstream::poller::DEFAULT_POLL_INTERVAL;
use folio_upstream::sources::MarketSources;
use local::{PrefsAction, StopwatchAction};
use state::AppState;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Market data gateway for the VIX and the Buffett Indicator, plus dashboard tools")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        #[arg(long, env = "HOST", default_value = "0.0.0.0")]
        host: IpAddr,
        #[arg(long, env = "PORT", default_value_t = 3001)]
        port: u16,
        #[arg(long, env = "APP_MODE", value_enum, default_value = "development")]
        mode: Mode,
        /// Allowed origins in production (comma-separated)
        #[arg(long, env = "CORS_ORIGINS", value_delimiter = ',')]
        cors_origins: Vec<String>,
        /// Built frontend bundle served in production
        #[arg(long, env = "STATIC_DIR", default_value = "dist")]
        static_dir: PathBuf,
        /// Skip the Prometheus recorder
        #[arg(long)]
        no_metrics: bool,
        #[command(flatten)]
        upstream: UpstreamArgs,
    },
    /// Run one fetch chain and print the envelope the gateway would return
    Fetch {
        #[arg(value_enum)]
        indicator: Indicator,
        #[command(flatten)]
        upstream: UpstreamArgs,
    },
    /// Poll a running gateway and log the dashboard readings
    Watch {
        #[arg(long, env = "GATEWAY_BASE_URL", default_value = DEFAULT_GATEWAY_URL)]
        gateway: String,
        /// Poll interval in seconds
        #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
        interval_secs: u64,
        #[arg(long, env = "FOLIO_STATE_DIR", default_value = ".folio")]
        state_dir: PathBuf,
    },
    /// Drive the persisted stopwatch
    Stopwatch {
        #[command(subcommand)]
        action: StopwatchAction,
        #[arg(long, env = "FOLIO_STATE_DIR", default_value = ".folio")]
        state_dir: PathBuf,
    },
    /// Read or change stored preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
        #[arg(long, env = "FOLIO_STATE_DIR", default_value = ".folio")]
        state_dir: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Indicator {
    Vix,
    Buffett,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Serve {
            host,
            port,
            mode,
            cors_origins,
            static_dir,
            no_metrics,
            upstream,
        } => {
            let config = GatewayConfig {
                addr: SocketAddr::new(host, port),
                mode,
                cors_origins,
                static_dir,
                upstream: upstream.to_config(),
            };
            serve(config, !no_metrics).await?;
        }
        Commands::Fetch { indicator, upstream } => {
            fetch_once(indicator, &upstream).await?;
        }
        Commands::Watch {
            gateway,
            interval_secs,
            state_dir,
        } => {
            let store = open_store(&state_dir)?;
            let client = GatewayClient::new(build_http_client(DEFAULT_TIMEOUT)?, &gateway);
            local::run_watch(client, &store, Duration::from_secs(interval_secs.max(1))).await?;
        }
        Commands::Stopwatch { action, state_dir } => {
            let store = open_store(&state_dir)?;
            let snapshot = local::run_stopwatch(&store, Arc::new(SystemClock), action).await?;
            println!(
                "{} {}",
                if snapshot.running { "running" } else { "stopped" },
                local::format_elapsed(snapshot.elapsed_ms)
            );
        }
        Commands::Prefs { action, state_dir } => {
            let store = open_store(&state_dir)?;
            let shown = local::run_prefs(&store, action)?;
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
    }

    Ok(())
}

fn open_store(dir: &Path) -> anyhow::Result<PreferenceStore> {
    PreferenceStore::on_disk(dir)
        .with_context(|| format!("Failed to open preference store at {:?}", dir))
}

async fn serve(config: GatewayConfig, with_metrics: bool) -> anyhow::Result<()> {
    info!(
        "Starting market gateway in {:?} mode on http://{}",
        config.mode, config.addr
    );
    info!("Allowed origins: {:?}", config.allowed_origins());
    if config.serves_static() {
        info!("Serving bundle from {:?}", config.static_dir);
    }

    let prometheus = if with_metrics {
        Some(metrics::install_recorder()?)
    } else {
        None
    };
    let sources = MarketSources::from_config(&config.upstream)?;
    let app = http::app(&config, AppState::new(sources, prometheus));

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Received Ctrl-C, shutting down");
    }
}

async fn fetch_once(indicator: Indicator, upstream: &UpstreamArgs) -> anyhow::Result<()> {
    let sources = MarketSources::from_config(&upstream.to_config())?;
    let body = match indicator {
        Indicator::Vix => match sources.vix.fetch().await {
            Ok(result) => serde_json::to_value(VixEnvelope::from_result(&result))?,
            Err(e) => serde_json::to_value(FailureEnvelope::new(
                "Failed to fetch VIX data",
                e.to_string(),
            ))?,
        },
        Indicator::Buffett => match sources.buffett.fetch().await {
            Ok(result) => match BuffettEnvelope::from_result(&result) {
                Some(envelope) => serde_json::to_value(envelope)?,
                None => serde_json::to_value(FailureEnvelope::new(
                    "Failed to fetch Buffett Indicator",
                    "Could not extract value from page",
                ))?,
            },
            Err(e) => serde_json::to_value(FailureEnvelope::new(
                "Failed to fetch Buffett Indicator",
                e.to_string(),
            ))?,
        },
    };
    println!("{}", serde_json::to_string_pretty(&body)?);
    anyhow::ensure!(body["success"] == true, "fetch failed");
    Ok(())
}
