//! Commands that act on the local preference store and the dashboard
//! collaborators rather than on the gateway itself.

use anyhow::Context;
use clap::Subcommand;
use folio_core::founder::{InputKey, SequenceDetector, FOUNDER_SEQUENCE};
use folio_core::oplog::OpLog;
use folio_core::prefs::{
    FounderMode, FounderModeKey, OverlaysKey, SimulatedBuffett, SimulatedBuffettKey,
    StopwatchKey, Theme, ThemeKey, ThemePreference, WidgetPosition, WidgetPositionKey,
};
use folio_core::stopwatch::{spawn_stopwatch, Clock, ElapsedSnapshot, DEFAULT_TICK};
use folio_core::store::PreferenceStore;
use folio_upstream::gateway::GatewayClient;
use folio_upstream::poller::{spawn_poller, DashboardSnapshot, RefreshTarget};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum StopwatchAction {
    /// Start (or keep running)
    Start,
    /// Stop and keep the accumulated time
    Stop,
    /// Clear the accumulated time
    Reset,
    /// Print the current elapsed time
    Status,
}

#[derive(Debug, Clone, Subcommand)]
pub enum PrefsAction {
    /// Print every stored preference
    Show,
    /// Set the color theme
    Theme { theme: String },
    /// Turn a visual overlay on or off
    Overlay { name: String, state: String },
    /// Store the dragged widget position
    Widget { x: f64, y: f64 },
    /// Override the Buffett Indicator on the dashboard, or `clear`
    SimulateBuffett { value: String },
    /// Enter a key sequence, e.g. `up up down down left right left right b a`
    Unlock { keys: Vec<String> },
}

/// Restores the persisted stopwatch, applies `action` and returns the
/// resulting snapshot. The actor writes every transition back to `store`.
pub async fn run_stopwatch(
    store: &PreferenceStore,
    clock: Arc<dyn Clock>,
    action: StopwatchAction,
) -> anyhow::Result<ElapsedSnapshot> {
    let persisted = store.load_or_default::<StopwatchKey>()?;
    let (stopwatch, task) = spawn_stopwatch(clock, Some(store.clone()), DEFAULT_TICK);
    stopwatch.init(persisted).await?;

    match action {
        StopwatchAction::Start => stopwatch.start().await?,
        StopwatchAction::Stop => stopwatch.stop().await?,
        StopwatchAction::Reset => stopwatch.reset().await?,
        StopwatchAction::Status => {}
    }
    let snapshot = stopwatch.query().await?;

    drop(stopwatch);
    task.await.context("stopwatch task panicked")?;
    Ok(snapshot)
}

pub fn format_elapsed(millis: i64) -> String {
    let total = millis.max(0) / 1000;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total / 3600,
        (total / 60) % 60,
        total % 60,
        millis.max(0) % 1000
    )
}

fn parse_switch(state: &str) -> anyhow::Result<bool> {
    match state.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        other => anyhow::bail!("expected on/off, got '{}'", other),
    }
}

/// Applies a preference command and returns what should be printed.
pub fn run_prefs(store: &PreferenceStore, action: PrefsAction) -> anyhow::Result<serde_json::Value> {
    match action {
        PrefsAction::Show => {}
        PrefsAction::Theme { theme } => {
            let theme: Theme = theme.parse()?;
            store.save::<ThemeKey>(&ThemePreference { theme })?;
        }
        PrefsAction::Overlay { name, state } => {
            let mut overlays = store.load_or_default::<OverlaysKey>()?;
            overlays.set(&name, parse_switch(&state)?);
            store.save::<OverlaysKey>(&overlays)?;
        }
        PrefsAction::Widget { x, y } => {
            anyhow::ensure!(x.is_finite() && y.is_finite(), "widget position must be finite");
            store.save::<WidgetPositionKey>(&WidgetPosition { x, y })?;
        }
        PrefsAction::SimulateBuffett { value } => {
            if value.eq_ignore_ascii_case("clear") {
                store.clear::<SimulatedBuffettKey>()?;
            } else {
                let value: f64 = value
                    .parse()
                    .with_context(|| format!("invalid Buffett Indicator value '{}'", value))?;
                anyhow::ensure!(value.is_finite() && value >= 0.0, "value must be a non-negative number");
                store.save::<SimulatedBuffettKey>(&SimulatedBuffett { value: Some(value) })?;
            }
        }
        PrefsAction::Unlock { keys } => {
            let keys = keys
                .iter()
                .map(|k| k.parse::<InputKey>())
                .collect::<anyhow::Result<Vec<_>>>()?;
            let (unlocked, progress) = founder_unlock(&keys);
            if unlocked {
                store.save::<FounderModeKey>(&FounderMode { unlocked: true })?;
                info!("Founder mode unlocked");
            } else {
                warn!(
                    "Key sequence did not unlock founder mode ({}/{} keys matched)",
                    progress,
                    FOUNDER_SEQUENCE.len()
                );
            }
        }
    }
    show(store)
}

/// Whether `keys` completed the founder sequence, and how far the trailing
/// keys got into it otherwise.
fn founder_unlock(keys: &[InputKey]) -> (bool, usize) {
    let mut detector = SequenceDetector::founder();
    let unlocked = keys.iter().fold(false, |unlocked, key| detector.push(*key) || unlocked);
    (unlocked, detector.progress())
}

fn show(store: &PreferenceStore) -> anyhow::Result<serde_json::Value> {
    Ok(json!({
        "theme": store.load_or_default::<ThemeKey>()?,
        "stopwatch": store.load_or_default::<StopwatchKey>()?,
        "widget-position": store.load::<WidgetPositionKey>()?,
        "overlays": store.load_or_default::<OverlaysKey>()?,
        "founder-mode": store.load_or_default::<FounderModeKey>()?,
        "simulated-buffett": store.load_or_default::<SimulatedBuffettKey>()?,
    }))
}

fn log_snapshot(snapshot: &DashboardSnapshot) {
    let vix = snapshot
        .vix
        .as_ref()
        .map(|v| format!("{:.2} ({})", v.value, v.source))
        .unwrap_or_else(|| "fetch failed".to_string());
    let buffett = match (snapshot.effective_buffett(), snapshot.effective_ratio()) {
        (Some(value), Some(ratio)) => format!(
            "{:.1}% ratio {} equity {}%{}",
            value,
            ratio.bucket.ratio(),
            ratio.allocation.equity_pct,
            if snapshot.simulated_buffett.is_some() { " (simulated)" } else { "" }
        ),
        (Some(value), None) => format!("{:.1}%", value),
        _ => "fetch failed".to_string(),
    };
    info!("VIX {} | Buffett {}", vix, buffett);
}

/// Polls the gateway until interrupted. Typing `r` and Enter refreshes both
/// indicators immediately.
pub async fn run_watch(
    client: GatewayClient,
    store: &PreferenceStore,
    interval: Duration,
) -> anyhow::Result<()> {
    let simulated = store.load_or_default::<SimulatedBuffettKey>()?.value;
    if let Some(value) = simulated {
        info!("Using simulated Buffett Indicator {}", value);
    }

    let oplog = OpLog::default();
    match client.health().await {
        Ok(health) => info!(
            "Gateway {} is up ({})",
            client.base_url(),
            health["status"].as_str().unwrap_or("unknown")
        ),
        Err(e) => {
            warn!("Gateway health check failed: {:#}", e);
            oplog.warn(format!("Gateway health check failed: {:#}", e)).await;
        }
    }
    info!("Watching {} every {:?}", client.base_url(), interval);
    let (poller, tasks) = spawn_poller(client, interval, oplog.clone(), simulated);
    let mut updates = poller.subscribe();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                log_snapshot(&snapshot);
            }
            line = stdin.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) if line.trim().eq_ignore_ascii_case("r") => {
                        info!("Manual refresh");
                        poller.refresh(RefreshTarget::All).await?;
                    }
                    Ok(Some(line)) if line.trim().eq_ignore_ascii_case("log") => {
                        for entry in oplog.recent(20).await {
                            println!("{} [{:?}] {}", entry.timestamp.to_rfc3339(), entry.level, entry.message);
                        }
                    }
                    Ok(Some(_)) => {}
                    // keep polling on schedule without manual refresh
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        stdin_open = false;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down watcher");
                break;
            }
        }
    }

    for task in tasks {
        task.abort();
    }
    Ok(())
}
