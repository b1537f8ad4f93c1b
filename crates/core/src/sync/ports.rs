//! Port interfaces for feed synchronization

use async_trait::async_trait;
use bookingsync_domain::{CalendarEvent, EventChanges, Feed, FetchError, StoreError, SyncRun};

/// Trait for retrieving a raw feed document over a network transport.
///
/// Implementations bound both the transfer time and the response size; no
/// side effects beyond the network call itself.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    /// Fetch the raw document bytes for a feed URL.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Persistence boundary for feeds and their events.
///
/// `apply_changes` must be atomic per feed: either all three change sets are
/// applied or none are, so a crash mid-write never leaves a feed
/// half-reconciled.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// List every configured feed.
    async fn list_feeds(&self) -> Result<Vec<Feed>, StoreError>;

    /// Look up a single feed by id.
    async fn get_feed(&self, feed_id: &str) -> Result<Option<Feed>, StoreError>;

    /// Register a new feed.
    async fn insert_feed(&self, feed: &Feed) -> Result<(), StoreError>;

    /// Delete a feed and, by ownership, all of its events.
    async fn delete_feed(&self, feed_id: &str) -> Result<(), StoreError>;

    /// Load the currently stored events for a feed.
    async fn load_events(&self, feed_id: &str) -> Result<Vec<CalendarEvent>, StoreError>;

    /// Apply a reconciled change set transactionally.
    async fn apply_changes(&self, feed_id: &str, changes: &EventChanges) -> Result<(), StoreError>;

    /// Record the outcome of a completed run and, on success, advance the
    /// feed's last-sync timestamp.
    async fn record_run_outcome(&self, feed_id: &str, run: &SyncRun) -> Result<(), StoreError>;
}
