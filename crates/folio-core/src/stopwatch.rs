//! Stopwatch actor. The task owns all timekeeping state; callers only send
//! commands and read elapsed snapshots.

use crate::prefs::{StopwatchKey, StopwatchState};
use crate::store::PreferenceStore;
use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock that only moves when told to.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start)),
        }
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElapsedSnapshot {
    pub running: bool,
    pub elapsed_ms: i64,
}

#[derive(Debug)]
enum StopwatchCommand {
    Init(StopwatchState),
    Start,
    Stop,
    Reset,
    Query(oneshot::Sender<ElapsedSnapshot>),
    State(oneshot::Sender<StopwatchState>),
}

#[derive(Clone)]
pub struct StopwatchHandle {
    tx: mpsc::Sender<StopwatchCommand>,
    updates: watch::Receiver<ElapsedSnapshot>,
}

impl StopwatchHandle {
    async fn send(&self, cmd: StopwatchCommand) -> anyhow::Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| anyhow::anyhow!("stopwatch task has stopped"))
    }

    pub async fn init(&self, state: StopwatchState) -> anyhow::Result<()> {
        self.send(StopwatchCommand::Init(state)).await
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.send(StopwatchCommand::Start).await
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(StopwatchCommand::Stop).await
    }

    pub async fn reset(&self) -> anyhow::Result<()> {
        self.send(StopwatchCommand::Reset).await
    }

    pub async fn query(&self) -> anyhow::Result<ElapsedSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.send(StopwatchCommand::Query(tx)).await?;
        rx.await.context("stopwatch dropped query reply")
    }

    pub async fn state(&self) -> anyhow::Result<StopwatchState> {
        let (tx, rx) = oneshot::channel();
        self.send(StopwatchCommand::State(tx)).await?;
        rx.await.context("stopwatch dropped state reply")
    }

    /// Receives a snapshot after every command and on every tick while running.
    pub fn subscribe(&self) -> watch::Receiver<ElapsedSnapshot> {
        self.updates.clone()
    }
}

struct StopwatchActor {
    state: StopwatchState,
    clock: Arc<dyn Clock>,
    store: Option<PreferenceStore>,
    updates: watch::Sender<ElapsedSnapshot>,
}

impl StopwatchActor {
    fn snapshot(&self) -> ElapsedSnapshot {
        let running_for = match (self.state.running, self.state.start_time) {
            (true, Some(start)) => (self.clock.now_millis() - start).max(0),
            _ => 0,
        };
        ElapsedSnapshot {
            running: self.state.running,
            elapsed_ms: self.state.elapsed + running_for,
        }
    }

    fn persist(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save::<StopwatchKey>(&self.state) {
                warn!("Failed to persist stopwatch state: {}", e);
            }
        }
    }

    fn publish(&self) {
        let _ = self.updates.send(self.snapshot());
    }

    fn handle(&mut self, cmd: StopwatchCommand) {
        match cmd {
            StopwatchCommand::Init(state) => {
                // A running state without a start time cannot be resumed.
                self.state = if state.running && state.start_time.is_none() {
                    StopwatchState {
                        running: false,
                        ..state
                    }
                } else {
                    state
                };
                debug!("Stopwatch initialised: {:?}", self.state);
            }
            StopwatchCommand::Start => {
                if !self.state.running {
                    self.state.running = true;
                    self.state.start_time = Some(self.clock.now_millis());
                    self.persist();
                }
            }
            StopwatchCommand::Stop => {
                if self.state.running {
                    self.state.elapsed = self.snapshot().elapsed_ms;
                    self.state.running = false;
                    self.state.start_time = None;
                    self.persist();
                }
            }
            StopwatchCommand::Reset => {
                self.state = StopwatchState::default();
                self.persist();
            }
            StopwatchCommand::Query(reply) => {
                let _ = reply.send(self.snapshot());
                return;
            }
            StopwatchCommand::State(reply) => {
                let _ = reply.send(self.state);
                return;
            }
        }
        self.publish();
    }

    async fn run(mut self, mut rx: mpsc::Receiver<StopwatchCommand>, tick: Duration) {
        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                cmd = rx.recv() => {
                    match cmd {
                        Some(cmd) => self.handle(cmd),
                        None => break,
                    }
                }
                _ = interval.tick() => {
                    if self.state.running {
                        self.publish();
                    }
                }
            }
        }
        debug!("Stopwatch task exiting");
    }
}

/// Spawns the stopwatch task. State changes are written to `store` when one
/// is given.
pub fn spawn_stopwatch(
    clock: Arc<dyn Clock>,
    store: Option<PreferenceStore>,
    tick: Duration,
) -> (StopwatchHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(32);
    let (updates_tx, updates_rx) = watch::channel(ElapsedSnapshot::default());
    let actor = StopwatchActor {
        state: StopwatchState::default(),
        clock,
        store,
        updates: updates_tx,
    };
    let task = tokio::spawn(actor.run(rx, tick));
    (
        StopwatchHandle {
            tx,
            updates: updates_rx,
        },
        task,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual() -> (ManualClock, Arc<dyn Clock>) {
        let clock = ManualClock::new(1_000_000);
        (clock.clone(), Arc::new(clock))
    }

    #[tokio::test]
    async fn test_start_stop_accumulates() {
        let (clock, shared) = manual();
        let (sw, _task) = spawn_stopwatch(shared, None, DEFAULT_TICK);

        sw.start().await.unwrap();
        clock.advance(1_500);
        assert_eq!(
            sw.query().await.unwrap(),
            ElapsedSnapshot { running: true, elapsed_ms: 1_500 }
        );

        sw.stop().await.unwrap();
        clock.advance(10_000);
        assert_eq!(
            sw.query().await.unwrap(),
            ElapsedSnapshot { running: false, elapsed_ms: 1_500 }
        );

        sw.start().await.unwrap();
        clock.advance(500);
        assert_eq!(sw.query().await.unwrap().elapsed_ms, 2_000);
    }

    #[tokio::test]
    async fn test_double_start_keeps_original_start() {
        let (clock, shared) = manual();
        let (sw, _task) = spawn_stopwatch(shared, None, DEFAULT_TICK);
        sw.start().await.unwrap();
        clock.advance(700);
        sw.start().await.unwrap();
        clock.advance(300);
        assert_eq!(sw.query().await.unwrap().elapsed_ms, 1_000);
    }

    #[tokio::test]
    async fn test_init_resumes_persisted_run() {
        let (clock, shared) = manual();
        let (sw, _task) = spawn_stopwatch(shared, None, DEFAULT_TICK);
        sw.init(StopwatchState {
            running: true,
            start_time: Some(clock.now_millis() - 3_000),
            elapsed: 1_000,
        })
        .await
        .unwrap();
        assert_eq!(sw.query().await.unwrap().elapsed_ms, 4_000);

        sw.init(StopwatchState {
            running: true,
            start_time: None,
            elapsed: 250,
        })
        .await
        .unwrap();
        assert_eq!(
            sw.query().await.unwrap(),
            ElapsedSnapshot { running: false, elapsed_ms: 250 }
        );
    }

    #[tokio::test]
    async fn test_transitions_are_persisted() {
        let (clock, shared) = manual();
        let store = PreferenceStore::in_memory();
        let (sw, _task) = spawn_stopwatch(shared, Some(store.clone()), DEFAULT_TICK);

        sw.start().await.unwrap();
        clock.advance(2_000);
        sw.stop().await.unwrap();
        // State round-trips through the actor so the save has happened.
        let state = sw.state().await.unwrap();
        assert_eq!(store.load::<StopwatchKey>().unwrap(), Some(state));
        assert_eq!(state.elapsed, 2_000);

        sw.reset().await.unwrap();
        sw.query().await.unwrap();
        assert_eq!(
            store.load::<StopwatchKey>().unwrap(),
            Some(StopwatchState::default())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_publish_while_running() {
        let (clock, shared) = manual();
        let (sw, _task) = spawn_stopwatch(shared, None, Duration::from_secs(1));
        let mut updates = sw.subscribe();

        sw.start().await.unwrap();
        sw.query().await.unwrap();
        updates.borrow_and_update();

        clock.advance(2_000);
        updates.changed().await.unwrap();
        assert_eq!(
            *updates.borrow_and_update(),
            ElapsedSnapshot { running: true, elapsed_ms: 2_000 }
        );
    }

    #[tokio::test]
    async fn test_handle_errors_after_task_ends() {
        let (_clock, shared) = manual();
        let (sw, task) = spawn_stopwatch(shared, None, DEFAULT_TICK);
        task.abort();
        let _ = task.await;
        assert!(sw.start().await.is_err());
    }
}
