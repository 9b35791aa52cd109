//! Periodic poll loop with an explicit start/stop lifecycle.
//!
//! [`PollScheduler`] moves through `Idle -> Running -> Stopped`. Starting
//! spawns one background task that polls immediately and then once per
//! interval. Each tick:
//!
//! 1. Fetch records through the [`FeedClient`].
//! 2. On success, replace [`PollState::records`] wholesale, push the same
//!    records into the [`SelectionStore`], and run them through the
//!    [`ThresholdNotifier`].
//! 3. On failure, set [`PollState::last_poll_error`] and keep the old
//!    records. No tick is fatal to the loop.
//!
//! # Overlap and cancellation
//!
//! Ticks run sequentially inside the single loop task, so two fetches can
//! never race on the shared state. A fetch that outlasts the interval
//! causes the missed ticks to be skipped, not queued.
//!
//! [`stop`](PollScheduler::stop) cancels the pending timer, aborts an
//! in-flight fetch (its result is never applied), and waits for the loop
//! task to exit. Once it returns no further poll will run.

use std::sync::Arc;
use std::time::Duration;

use quakewatch_types::{EarthquakeRecord, FeedQuery, NotificationId};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::feed::{FeedClient, FetchError};
use crate::notifier::{DispatchError, DispatchReport, NotificationSink, ThresholdNotifier};
use crate::selection::SelectionStore;
use crate::state::PollState;

/// Shortest interval the loop accepts; anything lower is raised to it.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Observable lifecycle of a [`PollScheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Never started.
    Idle,
    /// Poll loop active.
    Running,
    /// Stopped after running. May be started again.
    Stopped,
}

/// Query and cadence for a scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSettings {
    /// Query sent on every tick.
    pub query: FeedQuery,
    /// Time between the start of consecutive ticks.
    pub interval: Duration,
}

/// Summary of one tick, for logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Records were fetched and applied.
    Applied {
        /// Number of records in the new list.
        records: usize,
        /// What the notifier did with them.
        report: DispatchReport,
    },
    /// The fetch failed; previous records were kept.
    Failed(FetchError),
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

enum Phase {
    Idle,
    Running(RunningLoop),
    Stopped,
}

/// Everything the loop task needs, cloned out of the scheduler on start.
struct LoopContext<F, S> {
    feed: Arc<F>,
    notifier: Arc<Mutex<ThresholdNotifier<S>>>,
    selection: Arc<SelectionStore>,
    state: Arc<RwLock<PollState>>,
    settings: PollSettings,
    cancel: CancellationToken,
}

/// Drives the feed client and notifier on a fixed interval.
pub struct PollScheduler<F, S> {
    feed: Arc<F>,
    notifier: Arc<Mutex<ThresholdNotifier<S>>>,
    selection: Arc<SelectionStore>,
    state: Arc<RwLock<PollState>>,
    settings: PollSettings,
    phase: Mutex<Phase>,
}

impl<F, S> PollScheduler<F, S>
where
    F: FeedClient + 'static,
    S: NotificationSink + 'static,
{
    /// Create an idle scheduler.
    pub fn new(
        feed: F,
        notifier: ThresholdNotifier<S>,
        selection: Arc<SelectionStore>,
        settings: PollSettings,
    ) -> Self {
        Self {
            feed: Arc::new(feed),
            notifier: Arc::new(Mutex::new(notifier)),
            selection,
            state: Arc::new(RwLock::new(PollState::default())),
            settings,
            phase: Mutex::new(Phase::Idle),
        }
    }

    /// Start polling. The first poll runs immediately.
    ///
    /// Returns `false` without doing anything if already running. A
    /// stopped scheduler starts again with a fresh [`PollState`]; the
    /// notifier's dedup history carries over.
    pub async fn start(&self) -> bool {
        let mut phase = self.phase.lock().await;
        if matches!(*phase, Phase::Running(_)) {
            debug!("poll scheduler already running, start ignored");
            return false;
        }

        *self.state.write().await = PollState::running();

        let cancel = CancellationToken::new();
        let context = LoopContext {
            feed: Arc::clone(&self.feed),
            notifier: Arc::clone(&self.notifier),
            selection: Arc::clone(&self.selection),
            state: Arc::clone(&self.state),
            settings: self.settings,
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(run_loop(context));
        *phase = Phase::Running(RunningLoop { cancel, handle });

        info!(
            interval_ms = self.settings.interval.as_millis(),
            "poll scheduler started"
        );
        true
    }

    /// Stop polling and wait for the loop task to exit.
    ///
    /// Returns `false` without doing anything if not running. An
    /// in-flight fetch is aborted and its result discarded; a batch of
    /// dispatches already under way is allowed to finish.
    pub async fn stop(&self) -> bool {
        let mut phase = self.phase.lock().await;
        if !matches!(*phase, Phase::Running(_)) {
            debug!("poll scheduler not running, stop ignored");
            return false;
        }

        if let Phase::Running(running) = std::mem::replace(&mut *phase, Phase::Stopped) {
            running.cancel.cancel();
            if let Err(e) = running.handle.await {
                warn!(error = %e, "poll loop task ended abnormally");
            }
        }

        self.state.write().await.is_running = false;
        info!("poll scheduler stopped");
        true
    }

    /// Current lifecycle phase.
    pub async fn lifecycle(&self) -> Lifecycle {
        match *self.phase.lock().await {
            Phase::Idle => Lifecycle::Idle,
            Phase::Running(_) => Lifecycle::Running,
            Phase::Stopped => Lifecycle::Stopped,
        }
    }

    /// Copy of the current poll state.
    pub async fn snapshot(&self) -> PollState {
        self.state.read().await.clone()
    }

    /// Shared handle to the poll state.
    pub fn state(&self) -> Arc<RwLock<PollState>> {
        Arc::clone(&self.state)
    }

    /// The selection store fed by this scheduler.
    pub const fn selection(&self) -> &Arc<SelectionStore> {
        &self.selection
    }

    /// The configured query and interval.
    pub const fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Send the one-off confirmation notification through the
    /// scheduler's sink.
    pub async fn send_test_notification(&self) -> Result<NotificationId, DispatchError> {
        self.notifier.lock().await.send_test_notification().await
    }
}

impl<F, S> Drop for PollScheduler<F, S> {
    fn drop(&mut self) {
        if let Phase::Running(running) = self.phase.get_mut() {
            running.cancel.cancel();
        }
    }
}

async fn run_loop<F, S>(context: LoopContext<F, S>)
where
    F: FeedClient,
    S: NotificationSink,
{
    let mut ticker = tokio::time::interval(context.settings.interval.max(MIN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            () = context.cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let fetched = tokio::select! {
            biased;
            () = context.cancel.cancelled() => {
                debug!("in-flight fetch aborted by stop");
                break;
            }
            fetched = context.feed.fetch(&context.settings.query) => fetched,
        };

        match apply(&context, fetched).await {
            TickOutcome::Applied { records, report } => info!(
                records,
                qualifying = report.qualifying,
                dispatched = report.dispatched.len(),
                suppressed = report.suppressed.len(),
                failed = report.failed.len(),
                "poll applied"
            ),
            TickOutcome::Failed(error) => warn!(
                kind = ?error.kind(),
                error = %error,
                "poll failed, keeping previous records"
            ),
        }
    }

    debug!("poll loop exited");
}

async fn apply<F, S>(
    context: &LoopContext<F, S>,
    fetched: Result<Vec<EarthquakeRecord>, FetchError>,
) -> TickOutcome
where
    S: NotificationSink,
{
    match fetched {
        Ok(records) => {
            let records: Arc<[EarthquakeRecord]> = records.into();
            context
                .state
                .write()
                .await
                .record_success(Arc::clone(&records));
            context
                .selection
                .replace_records(Arc::clone(&records))
                .await;
            let report = context.notifier.lock().await.notify(&records).await;
            TickOutcome::Applied {
                records: records.len(),
                report,
            }
        }
        Err(error) => {
            context.state.write().await.record_failure(error.clone());
            TickOutcome::Failed(error)
        }
    }
}
