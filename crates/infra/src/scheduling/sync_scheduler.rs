//! Sync scheduler for periodic feed synchronization.
//!
//! Provides interval-based scheduling with lifecycle management. On every
//! tick the scheduler lists the configured feeds and spawns a sync run for
//! each feed whose cadence has elapsed. Runs for distinct feeds proceed in
//! parallel up to a concurrency cap; a second run for the same feed is
//! rejected while the first is still in flight.
//!
//! A failed run does not advance the feed's last-sync timestamp, so the feed
//! stays due and the next tick retries it. One feed's failure never affects
//! the runs of other feeds in the same tick.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bookingsync_core::FeedStore;
use bookingsync_domain::{Feed, RunOutcome, SchedulerSettings, SyncError, SyncRun};
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::observability::SyncMetrics;
use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::sync::FeedSyncWorker;

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for sync scheduler
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Interval between scheduler ticks
    pub tick_interval: Duration,
    /// Upper bound on feeds syncing concurrently
    pub max_concurrent_feeds: usize,
    /// Timeout applied to one feed run end to end
    pub run_timeout: Duration,
    /// Grace period for in-flight runs during shutdown
    pub shutdown_grace: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self::from(&SchedulerSettings::default())
    }
}

impl From<&SchedulerSettings> for SyncSchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        Self {
            tick_interval: Duration::from_secs(settings.tick_interval_secs),
            max_concurrent_feeds: settings.max_concurrent_feeds,
            run_timeout: Duration::from_secs(settings.run_timeout_secs),
            shutdown_grace: Duration::from_secs(settings.shutdown_grace_secs),
        }
    }
}

/// Result of asking the scheduler to run one feed now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A run was spawned for the feed.
    Accepted,
    /// A run for this feed is still in flight; no new run was spawned.
    RejectedOverlap,
}

/// Per-feed run state tracked by the scheduler.
#[derive(Debug, Clone, Default)]
struct FeedState {
    running: bool,
    last_outcome: Option<RunOutcome>,
}

/// Point-in-time view of one feed as the scheduler sees it.
#[derive(Debug, Clone)]
pub struct FeedRunStatus {
    pub feed_id: String,
    pub running: bool,
    pub last_outcome: Option<RunOutcome>,
}

/// Point-in-time view of the scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerStatus {
    pub running: bool,
    pub in_flight: usize,
    pub feeds: Vec<FeedRunStatus>,
}

/// Clears a feed's running flag and the in-flight counter when its run task
/// ends, whether it returns or panics.
struct RunGuard {
    states: Arc<DashMap<String, FeedState>>,
    in_flight: Arc<AtomicUsize>,
    feed_id: String,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if let Some(mut state) = self.states.get_mut(&self.feed_id) {
            state.running = false;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Everything a spawned run needs, cloneable into the task.
#[derive(Clone)]
struct RunContext {
    worker: FeedSyncWorker,
    store: Arc<dyn FeedStore>,
    states: Arc<DashMap<String, FeedState>>,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<AtomicUsize>,
    metrics: Arc<SyncMetrics>,
    run_timeout: Duration,
}

/// Periodic feed sync scheduler
pub struct SyncScheduler {
    context: RunContext,
    config: SyncSchedulerConfig,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl SyncScheduler {
    pub fn new(
        worker: FeedSyncWorker,
        store: Arc<dyn FeedStore>,
        config: SyncSchedulerConfig,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        let context = RunContext {
            worker,
            store,
            states: Arc::new(DashMap::new()),
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_feeds)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            metrics,
            run_timeout: config.run_timeout,
        };

        Self {
            context,
            config,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler
    ///
    /// Spawns a background task that ticks at the configured interval.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is already running
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!(tick_interval = ?self.config.tick_interval, "Starting sync scheduler");

        // Fresh token so the scheduler can restart after a stop
        self.cancellation_token = CancellationToken::new();

        let context = self.context.clone();
        let config = self.config.clone();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::tick_loop(context, config, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    ///
    /// Cancels the tick loop and waits up to the shutdown grace period for
    /// in-flight runs to drain. Runs still in their fetch stage abort on
    /// cancellation; runs past it finish their store write.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping sync scheduler");
        self.cancellation_token.cancel();

        let grace = self.config.shutdown_grace;
        let deadline = Instant::now() + grace;
        while self.context.in_flight.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        let remaining = self.context.in_flight.load(Ordering::SeqCst);
        if remaining > 0 {
            warn!(remaining, "Runs still in flight after shutdown grace");
        }

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(grace, handle)
                .await
                .map_err(|_| SchedulerError::ShutdownTimeout { seconds: grace.as_secs() })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!("Sync scheduler stopped");
        Ok(())
    }

    /// Check if scheduler is running
    ///
    /// A scheduler is considered running if it has an active task handle that
    /// hasn't finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Run one feed now, regardless of its cadence.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::FeedNotFound`] for an unknown feed id.
    #[instrument(skip(self))]
    pub async fn trigger_sync(&self, feed_id: &str) -> SchedulerResult<TriggerOutcome> {
        let feed = self
            .context
            .store
            .get_feed(feed_id)
            .await?
            .ok_or_else(|| SchedulerError::FeedNotFound(feed_id.to_string()))?;

        Ok(Self::spawn_run(&self.context, feed, &self.cancellation_token))
    }

    /// Run every configured feed now, regardless of cadence.
    ///
    /// Returns the number of runs actually spawned; feeds with a run already
    /// in flight are skipped.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> SchedulerResult<usize> {
        let feeds = self.context.store.list_feeds().await?;
        let spawned = feeds
            .into_iter()
            .filter(|feed| {
                Self::spawn_run(&self.context, feed.clone(), &self.cancellation_token)
                    == TriggerOutcome::Accepted
            })
            .count();

        info!(spawned, "Manual sync-all requested");
        Ok(spawned)
    }

    /// Current scheduler and per-feed run state.
    pub fn status(&self) -> SchedulerStatus {
        let mut feeds: Vec<FeedRunStatus> = self
            .context
            .states
            .iter()
            .map(|entry| FeedRunStatus {
                feed_id: entry.key().clone(),
                running: entry.value().running,
                last_outcome: entry.value().last_outcome.clone(),
            })
            .collect();
        feeds.sort_by(|a, b| a.feed_id.cmp(&b.feed_id));

        SchedulerStatus {
            running: self.is_running(),
            in_flight: self.context.in_flight.load(Ordering::SeqCst),
            feeds,
        }
    }

    /// Outcome of the most recent completed run for a feed, if any.
    pub fn last_outcome(&self, feed_id: &str) -> Option<RunOutcome> {
        self.context.states.get(feed_id).and_then(|state| state.last_outcome.clone())
    }

    /// Background tick loop
    async fn tick_loop(
        context: RunContext,
        config: SyncSchedulerConfig,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Tick loop cancelled");
                    break;
                }
                () = tokio::time::sleep(config.tick_interval) => {
                    context.metrics.record_tick();
                    Self::run_due_feeds(&context, &cancel).await;
                }
            }
        }
    }

    /// Spawn runs for every feed whose cadence has elapsed.
    async fn run_due_feeds(context: &RunContext, cancel: &CancellationToken) {
        let feeds = match context.store.list_feeds().await {
            Ok(feeds) => feeds,
            Err(e) => {
                error!(error = %e, "Failed to list feeds for tick");
                return;
            }
        };

        let now = Utc::now();
        let due: Vec<Feed> = feeds.into_iter().filter(|feed| feed.is_due(now)).collect();
        debug!(due = due.len(), "Tick");

        for feed in due {
            Self::spawn_run(context, feed, cancel);
        }
    }

    /// Mark a feed as running and spawn its sync task.
    ///
    /// The running flag is set before the task is spawned, so two callers
    /// racing on the same feed cannot both get `Accepted`.
    fn spawn_run(context: &RunContext, feed: Feed, cancel: &CancellationToken) -> TriggerOutcome {
        {
            let mut state = context.states.entry(feed.id.clone()).or_default();
            if state.running {
                debug!(feed_id = %feed.id, "Run already in flight; skipping");
                context.metrics.record_overlap_rejection();
                state.last_outcome = Some(RunOutcome::SkippedOverlap);
                return TriggerOutcome::RejectedOverlap;
            }
            state.running = true;
        }

        context.in_flight.fetch_add(1, Ordering::SeqCst);
        context.metrics.record_run_started();

        let context = context.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            Self::execute_run(context, feed, cancel).await;
        });

        TriggerOutcome::Accepted
    }

    /// Execute one feed run under the concurrency cap and run timeout.
    ///
    /// The running flag and in-flight counter are released by a drop guard,
    /// so a run task that dies mid-flight cannot leave its feed stuck in the
    /// `Running` state.
    async fn execute_run(context: RunContext, feed: Feed, cancel: CancellationToken) {
        let _guard = RunGuard {
            states: Arc::clone(&context.states),
            in_flight: Arc::clone(&context.in_flight),
            feed_id: feed.id.clone(),
        };

        let started_at = Utc::now();
        let outcome = Self::run_feed(&context, &feed, &cancel).await;

        if let Some(outcome) = outcome {
            let run = SyncRun {
                feed_id: feed.id.clone(),
                started_at,
                finished_at: Utc::now(),
                outcome: outcome.clone(),
            };
            if let Err(e) = context.store.record_run_outcome(&feed.id, &run).await {
                error!(feed_id = %feed.id, error = %e, "Failed to record run outcome");
            }
            if let Some(mut state) = context.states.get_mut(&feed.id) {
                state.last_outcome = Some(outcome);
            }
        }
    }

    /// Run the pipeline and classify the result.
    ///
    /// Returns `None` when the run was cancelled; cancelled runs are not
    /// recorded as outcomes.
    async fn run_feed(
        context: &RunContext,
        feed: &Feed,
        cancel: &CancellationToken,
    ) -> Option<RunOutcome> {
        let permit = match Arc::clone(&context.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return None,
        };
        let _permit = permit;

        if cancel.is_cancelled() {
            debug!(feed_id = %feed.id, "Cancelled before run started");
            return None;
        }

        let clock = Instant::now();
        let result =
            tokio::time::timeout(context.run_timeout, context.worker.sync_feed(feed, cancel)).await;
        context.metrics.record_run_duration(clock.elapsed());

        match result {
            Ok(Ok(stats)) => {
                context.metrics.record_run_succeeded(stats.inserted, stats.updated, stats.deleted);
                Some(RunOutcome::Succeeded {
                    inserted: stats.inserted,
                    updated: stats.updated,
                    deleted: stats.deleted,
                    skipped_items: stats.skipped_items,
                })
            }
            Ok(Err(SyncError::Cancelled)) => {
                debug!(feed_id = %feed.id, "Run cancelled during fetch");
                None
            }
            Ok(Err(err)) => {
                warn!(feed_id = %feed.id, error = %err, "Feed sync failed");
                context.metrics.record_run_failed();
                Some(RunOutcome::Failed {
                    kind: err.kind().to_string(),
                    message: err.to_string(),
                })
            }
            Err(_) => {
                warn!(feed_id = %feed.id, timeout = ?context.run_timeout, "Feed sync timed out");
                context.metrics.record_run_timed_out();
                Some(RunOutcome::Failed {
                    kind: "timeout".to_string(),
                    message: format!("run exceeded {}s", context.run_timeout.as_secs()),
                })
            }
        }
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for SyncScheduler {
    fn drop(&mut self) {
        // Best-effort cleanup; can't await the task handle here
        if !self.cancellation_token.is_cancelled() {
            warn!("SyncScheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
