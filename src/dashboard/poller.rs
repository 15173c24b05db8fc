use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::client::DashboardApi;
use super::state::{DashboardData, DashboardState, Phase};
use crate::error::DashboardError;

enum Command {
    Retry,
}

type FetchResult = (u64, Result<DashboardData, DashboardError>);

/// Handle to a mounted dashboard. Dropping it stops the refresh timer;
/// fetches already in flight finish but their results are discarded.
pub struct DashboardHandle {
    state: watch::Receiver<DashboardState>,
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl DashboardHandle {
    pub fn current(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.clone()
    }

    /// Request a manual retry. Only honoured in [`Phase::Error`].
    pub fn retry(&self) -> bool {
        if !self.state.borrow().can_retry() {
            return false;
        }
        self.commands.send(Command::Retry).is_ok()
    }
}

impl Drop for DashboardHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Issue the initial pair of requests and start the refresh timer
pub fn mount(api: Arc<dyn DashboardApi>, refresh_interval: Duration) -> DashboardHandle {
    let (state_tx, state_rx) = watch::channel(DashboardState::new());
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(run(api, refresh_interval, state_tx, command_rx));

    DashboardHandle {
        state: state_rx,
        commands: command_tx,
        task,
    }
}

async fn run(
    api: Arc<dyn DashboardApi>,
    refresh_interval: Duration,
    state_tx: watch::Sender<DashboardState>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let (result_tx, mut results) = mpsc::unbounded_channel::<FetchResult>();
    let mut state = DashboardState::new();

    let mut ticker = tokio::time::interval_at(Instant::now() + refresh_interval, refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    issue_fetch(&api, &mut state, &result_tx);
    state_tx.send_replace(state.clone());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracing::debug!("Dashboard refresh tick");
                issue_fetch(&api, &mut state, &result_tx);
                state_tx.send_replace(state.clone());
            }
            Some((generation, result)) = results.recv() => {
                if state.complete(generation, result) {
                    state_tx.send_replace(state.clone());
                } else {
                    tracing::debug!(generation, "Discarded superseded dashboard fetch");
                }
            }
            command = commands.recv() => match command {
                Some(Command::Retry) if state.phase == Phase::Error => {
                    tracing::info!("Manual dashboard retry");
                    issue_fetch(&api, &mut state, &result_tx);
                    state_tx.send_replace(state.clone());
                }
                Some(Command::Retry) => {}
                None => break,
            },
        }
    }
}

/// Both requests run concurrently; the pair fails if either fails
fn issue_fetch(
    api: &Arc<dyn DashboardApi>,
    state: &mut DashboardState,
    results: &mpsc::UnboundedSender<FetchResult>,
) {
    let generation = state.begin_fetch();
    let api = Arc::clone(api);
    let results = results.clone();

    tokio::spawn(async move {
        let (assets, stats) = tokio::join!(api.fetch_assets(), api.fetch_market_stats());
        let outcome = match (assets, stats) {
            (Ok(assets), Ok(stats)) => Ok(DashboardData { assets, stats }),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(generation, error = %e, "Dashboard fetch failed");
                Err(e)
            }
        };
        // Receiver is gone once the dashboard is unmounted
        let _ = results.send((generation, outcome));
    });
}
