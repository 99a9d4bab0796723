// Poll controller: owns the live view state and drives snapshot fetches on
// configuration changes, timer ticks, and manual refresh.
// Fetches are tagged with a monotonically increasing sequence number; only
// the most recently initiated fetch may update state, so a slow superseded
// response can never overwrite a newer one.

use crate::models::{HostSnapshot, Window};
use crate::rollup::{self, Rollup};
use crate::stats_repo::{FetchError, StatsRepo};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant, Interval, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

/// User-controlled polling configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub window: Window,
    /// Seconds between automatic refreshes; 0 = manual only.
    pub refresh_secs: u64,
    /// Server-side vhost filter, empty = all hosts.
    pub filter: String,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            window: Window::default(),
            refresh_secs: 15,
            filter: String::new(),
        }
    }
}

/// State exposed to presentation consumers. Mutated only by the poller
/// task; everyone else reads immutable copies through the watch channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    pub snapshots: Vec<HostSnapshot>,
    pub rollup: Rollup,
    /// True from fetch start until the newest in-flight fetch resolves.
    pub loading: bool,
    /// Message from the last failed fetch; cleared on the next success.
    pub error: Option<String>,
    /// Unix millis of the last successful fetch.
    pub last_updated_ms: Option<u64>,
}

enum Command {
    SetWindow(Window),
    SetRefreshSecs(u64),
    SetFilter(String),
    RefreshNow,
    Shutdown,
}

type FetchDone = (u64, Result<Vec<HostSnapshot>, FetchError>);

/// Cloneable handle to a running poller. Commands sent after shutdown are
/// silently dropped.
#[derive(Clone)]
pub struct PollerHandle {
    cmd_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<ViewState>,
}

impl PollerHandle {
    pub async fn set_window(&self, window: Window) {
        let _ = self.cmd_tx.send(Command::SetWindow(window)).await;
    }

    pub async fn set_refresh_secs(&self, secs: u64) {
        let _ = self.cmd_tx.send(Command::SetRefreshSecs(secs)).await;
    }

    pub async fn set_filter(&self, filter: impl Into<String>) {
        let _ = self.cmd_tx.send(Command::SetFilter(filter.into())).await;
    }

    pub async fn refresh_now(&self) {
        let _ = self.cmd_tx.send(Command::RefreshNow).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(Command::Shutdown).await;
    }

    /// Copy of the current view state.
    pub fn view(&self) -> ViewState {
        self.view_rx.borrow().clone()
    }

    /// Receiver that yields every published view state change.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view_rx.clone()
    }
}

/// Spawns the poller task. An initial fetch starts immediately; the
/// returned handle controls the task, the join handle resolves after
/// shutdown.
pub fn spawn(
    repo: Arc<StatsRepo>,
    config: PollConfig,
) -> (PollerHandle, tokio::task::JoinHandle<()>) {
    let (cmd_tx, cmd_rx) = mpsc::channel(16);
    let initial = ViewState {
        loading: true,
        ..ViewState::default()
    };
    let (view_tx, view_rx) = watch::channel(initial);
    let handle = PollerHandle { cmd_tx, view_rx };
    let join = tokio::spawn(run(repo, config, cmd_rx, view_tx));
    (handle, join)
}

async fn run(
    repo: Arc<StatsRepo>,
    mut config: PollConfig,
    mut cmd_rx: mpsc::Receiver<Command>,
    view_tx: watch::Sender<ViewState>,
) {
    // done_tx is kept alive here, so done_rx.recv() never yields None.
    let (done_tx, mut done_rx) = mpsc::channel::<FetchDone>(16);
    let mut state = view_tx.borrow().clone();
    let mut seq: u64 = 0;
    let mut timer = arm_timer(config.refresh_secs);

    start_fetch(&repo, &config, &mut seq, &done_tx, &mut state, &view_tx);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::SetWindow(window)) => {
                    if config.window != window {
                        config.window = window;
                        start_fetch(&repo, &config, &mut seq, &done_tx, &mut state, &view_tx);
                    }
                }
                Some(Command::SetRefreshSecs(secs)) => {
                    if config.refresh_secs != secs {
                        config.refresh_secs = secs;
                        timer = arm_timer(secs);
                    }
                }
                Some(Command::SetFilter(filter)) => {
                    if config.filter != filter {
                        config.filter = filter;
                        start_fetch(&repo, &config, &mut seq, &done_tx, &mut state, &view_tx);
                    }
                }
                Some(Command::RefreshNow) => {
                    start_fetch(&repo, &config, &mut seq, &done_tx, &mut state, &view_tx);
                }
                Some(Command::Shutdown) | None => break,
            },
            Some((fetch_seq, result)) = done_rx.recv() => {
                if fetch_seq != seq {
                    debug!(
                        operation = "adopt_fetch",
                        fetch_seq,
                        latest_seq = seq,
                        "superseded fetch result dropped"
                    );
                    continue;
                }
                adopt(&mut state, result);
                view_tx.send_replace(state.clone());
            }
            _ = tick(&mut timer) => {
                start_fetch(&repo, &config, &mut seq, &done_tx, &mut state, &view_tx);
            }
        }
    }
    debug!("Poller shutting down");
}

/// Starts one fetch tagged with the next sequence number and publishes the
/// loading transition. The fetch runs in its own task; its result comes
/// back through done_tx and is dropped there if the poller is gone.
fn start_fetch(
    repo: &Arc<StatsRepo>,
    config: &PollConfig,
    seq: &mut u64,
    done_tx: &mpsc::Sender<FetchDone>,
    state: &mut ViewState,
    view_tx: &watch::Sender<ViewState>,
) {
    *seq += 1;
    let fetch_seq = *seq;
    state.loading = true;
    view_tx.send_replace(state.clone());

    let repo = repo.clone();
    let window = config.window;
    let filter = config.filter.clone();
    let tx = done_tx.clone();
    tokio::spawn(async move {
        let result = repo.fetch_snapshots(window, &filter).await;
        let _ = tx.send((fetch_seq, result)).await;
    });
}

/// Applies the newest fetch's outcome. Failures keep the previous
/// snapshots (stale data beats no data); successes replace them wholesale
/// and recompute the rollup.
fn adopt(state: &mut ViewState, result: Result<Vec<HostSnapshot>, FetchError>) {
    match result {
        Ok(snapshots) => {
            state.rollup = rollup::compute(&snapshots);
            state.snapshots = snapshots;
            state.error = None;
            state.last_updated_ms = Some(now_ms());
        }
        Err(e) => {
            warn!(error = %e, operation = "fetch_snapshots", "snapshot fetch failed");
            state.error = Some(e.to_string());
        }
    }
    state.loading = false;
}

/// At most one timer is armed per poller; replacing the Option replaces
/// the timer. The first tick fires one full period after arming, since the
/// configuration change that armed it already triggered its own fetch.
fn arm_timer(refresh_secs: u64) -> Option<Interval> {
    if refresh_secs == 0 {
        return None;
    }
    let period = Duration::from_secs(refresh_secs);
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(timer)
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_else(|e| {
            warn!(error = %e, operation = "get_timestamp", "system time error");
            0
        })
}
