//! Per-feed sync pipeline: fetch, parse, reconcile, persist.
//!
//! The fetch stage races against the cancellation token so shutdown never
//! waits on a slow remote server. Once the document is in hand the remaining
//! stages run to completion; the store write is transactional and fast, and
//! aborting it would waste the fetch.

use std::sync::Arc;

use bookingsync_core::{reconcile, FeedFetcher, FeedStore};
use bookingsync_domain::{Feed, ParseOptions, SyncError};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Counters from one completed sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Events the parser skipped as individually malformed or in the past.
    pub skipped_items: usize,
}

/// Executes the sync pipeline for a single feed.
#[derive(Clone)]
pub struct FeedSyncWorker {
    fetcher: Arc<dyn FeedFetcher>,
    store: Arc<dyn FeedStore>,
}

impl FeedSyncWorker {
    pub fn new(fetcher: Arc<dyn FeedFetcher>, store: Arc<dyn FeedStore>) -> Self {
        Self { fetcher, store }
    }

    /// Run one full sync for `feed`.
    ///
    /// On success the applied change counts are returned; the caller records
    /// the run outcome. A cancellation hit during the fetch stage surfaces as
    /// [`SyncError::Cancelled`].
    #[instrument(skip(self, feed, cancel), fields(feed_id = %feed.id, url = %feed.url))]
    pub async fn sync_feed(
        &self,
        feed: &Feed,
        cancel: &CancellationToken,
    ) -> Result<RunStats, SyncError> {
        let body = tokio::select! {
            result = self.fetcher.fetch(&feed.url) => result?,
            () = cancel.cancelled() => return Err(SyncError::Cancelled),
        };
        debug!(bytes = body.len(), "feed document fetched");

        // Events already over are of no use to availability; drop them at
        // parse time so they never reach the store.
        let options = ParseOptions { horizon: Some(Utc::now()), ..ParseOptions::default() };
        let report = bookingsync_domain::parse_ical(&body, &options)?;

        let stored = self.store.load_events(&feed.id).await?;
        let changes = reconcile(&stored, &report.events);

        let stats = RunStats {
            inserted: changes.to_insert.len(),
            updated: changes.to_update.len(),
            deleted: changes.to_delete.len(),
            skipped_items: report.skipped.len(),
        };

        if changes.is_empty() {
            debug!("no changes for feed");
        } else {
            self.store.apply_changes(&feed.id, &changes).await?;
        }

        info!(
            inserted = stats.inserted,
            updated = stats.updated,
            deleted = stats.deleted,
            skipped = stats.skipped_items,
            "feed synchronized"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use bookingsync_domain::{
        CalendarEvent, EventChanges, FetchError, StoreError, SyncRun,
    };

    use super::*;

    struct StaticFetcher {
        body: Vec<u8>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FeedFetcher for StaticFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.body.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl FeedFetcher for FailingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            Err(FetchError::HttpStatus(503))
        }
    }

    struct HangingFetcher;

    #[async_trait]
    impl FeedFetcher for HangingFetcher {
        async fn fetch(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct RecordingStore {
        stored: Mutex<Vec<CalendarEvent>>,
        applied: Mutex<Vec<EventChanges>>,
        apply_calls: AtomicUsize,
    }

    #[async_trait]
    impl FeedStore for RecordingStore {
        async fn list_feeds(&self) -> Result<Vec<Feed>, StoreError> {
            Ok(Vec::new())
        }

        async fn get_feed(&self, _feed_id: &str) -> Result<Option<Feed>, StoreError> {
            Ok(None)
        }

        async fn insert_feed(&self, _feed: &Feed) -> Result<(), StoreError> {
            Ok(())
        }

        async fn delete_feed(&self, _feed_id: &str) -> Result<(), StoreError> {
            Ok(())
        }

        async fn load_events(&self, _feed_id: &str) -> Result<Vec<CalendarEvent>, StoreError> {
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn apply_changes(
            &self,
            _feed_id: &str,
            changes: &EventChanges,
        ) -> Result<(), StoreError> {
            self.apply_calls.fetch_add(1, Ordering::SeqCst);
            self.applied.lock().unwrap().push(changes.clone());
            Ok(())
        }

        async fn record_run_outcome(&self, _feed_id: &str, _run: &SyncRun) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn future_ics(uid: &str) -> Vec<u8> {
        let start = Utc::now() + chrono::Duration::days(30);
        let end = start + chrono::Duration::days(2);
        format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nBEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:Reserved\r\nDTSTART:{}\r\nDTEND:{}\r\nEND:VEVENT\r\nEND:VCALENDAR\r\n",
            start.format("%Y%m%dT%H%M%SZ"),
            end.format("%Y%m%dT%H%M%SZ"),
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn successful_run_applies_changes_and_reports_stats() {
        let store = Arc::new(RecordingStore::default());
        let fetcher = Arc::new(StaticFetcher { body: future_ics("booking-1"), calls: AtomicUsize::new(0) });
        let worker = FeedSyncWorker::new(fetcher.clone(), store.clone());
        let feed = Feed::new("https://example.com/cal.ics", None, 1800);

        let stats = worker.sync_feed(&feed, &CancellationToken::new()).await.unwrap();

        assert_eq!(stats.inserted, 1);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.deleted, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.apply_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unchanged_feed_skips_the_store_write() {
        let body = future_ics("booking-1");
        let options = ParseOptions::default();
        let parsed = bookingsync_domain::parse_ical(&body, &options).unwrap();

        let store = Arc::new(RecordingStore::default());
        *store.stored.lock().unwrap() = parsed.events;

        let fetcher = Arc::new(StaticFetcher { body, calls: AtomicUsize::new(0) });
        let worker = FeedSyncWorker::new(fetcher, store.clone());
        let feed = Feed::new("https://example.com/cal.ics", None, 1800);

        let stats = worker.sync_feed(&feed, &CancellationToken::new()).await.unwrap();

        assert_eq!(stats, RunStats { skipped_items: 0, ..Default::default() });
        assert_eq!(store.apply_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fetch_failure_propagates_without_touching_the_store() {
        let store = Arc::new(RecordingStore::default());
        let worker = FeedSyncWorker::new(Arc::new(FailingFetcher), store.clone());
        let feed = Feed::new("https://example.com/cal.ics", None, 1800);

        let err = worker.sync_feed(&feed, &CancellationToken::new()).await.unwrap_err();

        assert_eq!(err.kind(), "fetch_http_status");
        assert_eq!(store.apply_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_during_fetch_aborts_the_run() {
        let store = Arc::new(RecordingStore::default());
        let worker = FeedSyncWorker::new(Arc::new(HangingFetcher), store.clone());
        let feed = Feed::new("https://example.com/cal.ics", None, 1800);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = worker.sync_feed(&feed, &cancel).await.unwrap_err();

        assert!(matches!(err, SyncError::Cancelled));
        assert_eq!(store.apply_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_document_is_a_parse_error() {
        let store = Arc::new(RecordingStore::default());
        let fetcher = Arc::new(StaticFetcher {
            body: b"not a calendar at all".to_vec(),
            calls: AtomicUsize::new(0),
        });
        let worker = FeedSyncWorker::new(fetcher, store);
        let feed = Feed::new("https://example.com/cal.ics", None, 1800);

        let err = worker.sync_feed(&feed, &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.kind(), "parse");
    }
}
