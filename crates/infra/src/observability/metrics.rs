//! In-process sync metrics.
//!
//! Plain atomic counters, shared across the scheduler and its spawned runs.
//! Counters only ever increase; a snapshot is a consistent-enough point-in-time
//! read for logging and status reporting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{MetricsError, MetricsResult};

/// Counters covering scheduler ticks and per-feed runs.
#[derive(Debug, Default)]
pub struct SyncMetrics {
    ticks: AtomicU64,
    runs_started: AtomicU64,
    runs_succeeded: AtomicU64,
    runs_failed: AtomicU64,
    runs_timed_out: AtomicU64,
    overlap_rejections: AtomicU64,
    events_inserted: AtomicU64,
    events_updated: AtomicU64,
    events_deleted: AtomicU64,
    run_duration_millis_total: AtomicU64,
}

/// Point-in-time read of all counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub ticks: u64,
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub runs_timed_out: u64,
    pub overlap_rejections: u64,
    pub events_inserted: u64,
    pub events_updated: u64,
    pub events_deleted: u64,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_succeeded(&self, inserted: usize, updated: usize, deleted: usize) {
        self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
        self.events_inserted.fetch_add(inserted as u64, Ordering::Relaxed);
        self.events_updated.fetch_add(updated as u64, Ordering::Relaxed);
        self.events_deleted.fetch_add(deleted as u64, Ordering::Relaxed);
    }

    pub fn record_run_failed(&self) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_timed_out(&self) {
        self.runs_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_overlap_rejection(&self) {
        self.overlap_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run_duration(&self, duration: Duration) {
        self.run_duration_millis_total
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    /// Mean wall-clock duration over all completed runs.
    pub fn average_run_duration(&self) -> MetricsResult<Duration> {
        let completed = self.runs_succeeded.load(Ordering::Relaxed)
            + self.runs_failed.load(Ordering::Relaxed)
            + self.runs_timed_out.load(Ordering::Relaxed);
        if completed == 0 {
            return Err(MetricsError::EmptyData);
        }
        let total = self.run_duration_millis_total.load(Ordering::Relaxed);
        Ok(Duration::from_millis(total / completed))
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            runs_timed_out: self.runs_timed_out.load(Ordering::Relaxed),
            overlap_rejections: self.overlap_rejections.load(Ordering::Relaxed),
            events_inserted: self.events_inserted.load(Ordering::Relaxed),
            events_updated: self.events_updated.load(Ordering::Relaxed),
            events_deleted: self.events_deleted.load(Ordering::Relaxed),
        }
    }
}
