//! Background refresh loop.
//!
//! A single tokio task owns the [`RefreshState`] and re-runs the
//! [`Aggregator`] for the active [`QueryWindow`]. Callers steer it through a
//! [`RefreshHandle`] and read published snapshots through a `watch` channel,
//! so nothing outside the task ever holds a lock on the state.
//!
//! Two modes:
//! - **Polling** (day offsets): evaluate on entry, then every interval. A
//!   call still running when the next tick fires is abandoned and replaced.
//! - **Fixed** (explicit date): evaluate once on entry.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Interval, MissedTickBehavior};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use traffic_core::window::widest_offset;
use traffic_core::{AppTrafficData, ErrorKind, QueryWindow, Result, TotalTrafficData};
use traffic_data::{Aggregation, Aggregator};

/// Cadence of Polling mode unless configured otherwise.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

// ── Public types ──────────────────────────────────────────────────────────────

/// Latest published aggregation.
///
/// Failed evaluations never clear `app_data` or `total`; they only set
/// `last_error`, so subscribers always see the last known good data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshState {
    /// Window being evaluated, `None` while idle after an invalid request.
    pub mode: Option<QueryWindow>,
    /// Rows sorted descending by total bytes.
    pub app_data: Vec<AppTrafficData>,
    pub total: TotalTrafficData,
    pub last_error: Option<ErrorKind>,
    /// When `app_data` was last replaced.
    pub updated_at: Option<DateTime<Utc>>,
}

impl RefreshState {
    /// First `n` rows, or all of them when fewer exist.
    pub fn top(&self, n: usize) -> &[AppTrafficData] {
        &self.app_data[..n.min(self.app_data.len())]
    }
}

#[derive(Debug)]
enum Command {
    Window(QueryWindow),
    Invalid,
}

// ── RefreshLoop ───────────────────────────────────────────────────────────────

/// Builder for the background refresh task.
pub struct RefreshLoop {
    aggregator: Aggregator,
    interval: Duration,
}

impl RefreshLoop {
    pub fn new(aggregator: Aggregator) -> Self {
        Self {
            aggregator,
            interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    /// Override the Polling cadence. A zero interval keeps the default.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        if interval.is_zero() {
            warn!("zero refresh interval ignored; using default");
            self.interval = DEFAULT_REFRESH_INTERVAL;
        } else {
            self.interval = interval;
        }
        self
    }

    /// Spawn the loop in Polling mode over `initial_offsets`.
    ///
    /// An invalid initial set starts the loop idle with
    /// `last_error = InvalidWindow`; nothing is evaluated until a valid
    /// window arrives. Must be called from within a tokio runtime.
    pub fn start(self, initial_offsets: BTreeSet<i64>) -> RefreshHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let (window, initial_state) = match widest_offset(&initial_offsets) {
            Ok(_) => {
                let window = QueryWindow::DayOffsets(initial_offsets);
                let state = RefreshState {
                    mode: Some(window.clone()),
                    ..RefreshState::default()
                };
                (Some(window), state)
            }
            Err(e) => {
                warn!(error = %e, "initial day offsets rejected; refresh loop idle");
                let state = RefreshState {
                    last_error: Some(e.kind()),
                    ..RefreshState::default()
                };
                (None, state)
            }
        };

        let (state_tx, state_rx) = watch::channel(initial_state);
        let task = tokio::spawn(run(
            self.aggregator,
            self.interval,
            window,
            command_rx,
            state_tx,
            cancel.clone(),
        ));

        RefreshHandle {
            commands: command_tx,
            state: state_rx,
            cancel,
            task,
        }
    }
}

// ── RefreshHandle ─────────────────────────────────────────────────────────────

/// Control and observation endpoint of a running refresh loop.
pub struct RefreshHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<RefreshState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Switch to Polling over `offsets`, abandoning any in-flight evaluation.
    ///
    /// An empty set or a negative offset stops polling, publishes
    /// `InvalidWindow` and keeps the previous rows.
    pub fn set_day_offsets(&self, offsets: BTreeSet<i64>) -> Result<()> {
        if let Err(e) = widest_offset(&offsets) {
            self.send(Command::Invalid);
            return Err(e);
        }
        self.send(Command::Window(QueryWindow::DayOffsets(offsets)));
        Ok(())
    }

    /// Switch to Fixed mode for `date`, abandoning any in-flight evaluation.
    pub fn set_explicit_date(&self, date: NaiveDate) {
        self.send(Command::Window(QueryWindow::ExplicitDate(date)));
    }

    /// Copy of the latest published state.
    pub fn snapshot(&self) -> RefreshState {
        self.state.borrow().clone()
    }

    /// Stream yielding the current state, then every subsequent publish.
    pub fn subscribe(&self) -> WatchStream<RefreshState> {
        WatchStream::new(self.state.clone())
    }

    /// Raw receiver for consumers that read the state on demand.
    pub fn snapshots(&self) -> watch::Receiver<RefreshState> {
        self.state.clone()
    }

    /// Ask the loop to stop. Returns immediately.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop task to finish.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "refresh loop task failed");
        }
    }

    fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!("refresh loop already stopped; command dropped");
        }
    }
}

// ── Loop task ─────────────────────────────────────────────────────────────────

type InFlight = JoinHandle<Result<Aggregation>>;

async fn run(
    aggregator: Aggregator,
    interval: Duration,
    mut window: Option<QueryWindow>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<RefreshState>,
    cancel: CancellationToken,
) {
    let mut ticker = new_ticker(interval);
    let mut in_flight: Option<InFlight> = None;

    loop {
        let polling = matches!(window, Some(QueryWindow::DayOffsets(_)));

        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("refresh loop cancelled");
                break;
            }

            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("all refresh handles dropped; exiting loop");
                    break;
                };
                // Dropping the handle detaches the blocking call; its result
                // is never observed.
                in_flight = None;
                match command {
                    Command::Window(next) => {
                        info!(mode = %next, "refresh mode changed");
                        state.send_modify(|s| s.mode = Some(next.clone()));
                        match &next {
                            QueryWindow::DayOffsets(_) => ticker = new_ticker(interval),
                            QueryWindow::ExplicitDate(_) => {
                                in_flight = Some(launch(&aggregator, &next));
                            }
                        }
                        window = Some(next);
                    }
                    Command::Invalid => {
                        warn!("invalid day offsets; polling stopped");
                        window = None;
                        state.send_modify(|s| {
                            s.mode = None;
                            s.last_error = Some(ErrorKind::InvalidWindow);
                        });
                    }
                }
            }

            joined = join_in_flight(&mut in_flight) => {
                in_flight = None;
                publish(&state, joined);
            }

            _ = ticker.tick(), if polling => {
                if in_flight.is_some() {
                    warn!("previous aggregation still running; abandoning it");
                }
                if let Some(current) = &window {
                    in_flight = Some(launch(&aggregator, current));
                }
            }
        }
    }
}

fn new_ticker(period: Duration) -> Interval {
    // The first tick completes immediately and acts as the on-entry evaluation.
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

fn launch(aggregator: &Aggregator, window: &QueryWindow) -> InFlight {
    let aggregator = aggregator.clone();
    let window = window.clone();
    tokio::task::spawn_blocking(move || aggregator.aggregate_window_at(&window, Utc::now()))
}

async fn join_in_flight(
    slot: &mut Option<InFlight>,
) -> std::result::Result<Result<Aggregation>, JoinError> {
    match slot {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn publish(
    state: &watch::Sender<RefreshState>,
    joined: std::result::Result<Result<Aggregation>, JoinError>,
) {
    match joined {
        Ok(Ok(aggregation)) => {
            debug!(
                apps = aggregation.apps.len(),
                total_bytes = aggregation.total.total_bytes,
                "publishing snapshot"
            );
            state.send_modify(|s| {
                s.app_data = aggregation.apps;
                s.total = aggregation.total;
                s.last_error = None;
                s.updated_at = Some(Utc::now());
            });
        }
        Ok(Err(e)) => {
            warn!(error = %e, "aggregation failed; keeping previous snapshot");
            state.send_modify(|s| s.last_error = Some(e.kind()));
        }
        Err(e) => {
            warn!(error = %e, "aggregation task panicked; keeping previous snapshot");
            state.send_modify(|s| s.last_error = Some(ErrorKind::SourceUnavailable));
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
