//! Common data types used throughout the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Outcome of the most recently completed sync for a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedSyncStatus {
    Success,
    Failure,
}

/// A configured external calendar source to be periodically synchronized.
///
/// Feeds are registered by the admin boundary; the scheduler only reads them
/// and mutates the last-sync fields through outcome recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub url: String,
    pub name: Option<String>,
    /// Sync cadence in seconds.
    pub sync_interval_secs: i64,
    /// Timestamp of the last *successful* sync.
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_status: Option<FeedSyncStatus>,
    pub last_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Feed {
    /// Create a new feed with a fresh id and no sync history.
    pub fn new(url: impl Into<String>, name: Option<String>, sync_interval_secs: i64) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            url: url.into(),
            name,
            sync_interval_secs,
            last_synced_at: None,
            last_status: None,
            last_message: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this feed's cadence has elapsed at `now`.
    ///
    /// Feeds that have never synced successfully are always due; a failed run
    /// does not advance `last_synced_at`, so failures retry on the next tick.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last_synced_at {
            None => true,
            Some(last) => (now - last).num_seconds() >= self.sync_interval_secs,
        }
    }
}

/// A single calendar event as stored locally, owned by exactly one feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Stable external identifier assigned by the source calendar (iCal UID).
    pub uid: String,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub all_day: bool,
    /// Stable hash over the mutable fields, used to detect changes cheaply.
    pub fingerprint: String,
}

impl CalendarEvent {
    /// Build an event and compute its fingerprint from the mutable fields.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        uid: impl Into<String>,
        title: impl Into<String>,
        description: Option<String>,
        location: Option<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        all_day: bool,
    ) -> Self {
        let mut event = Self {
            uid: uid.into(),
            title: title.into(),
            description,
            location,
            start,
            end,
            all_day,
            fingerprint: String::new(),
        };
        event.fingerprint = event.compute_fingerprint();
        event
    }

    /// Deterministic hash over the mutable fields.
    ///
    /// The hash input is a fixed canonical field sequence with explicit
    /// separators, so it is independent of the order fields appeared in the
    /// source document, and any change to a mutable field changes the digest.
    pub fn compute_fingerprint(&self) -> String {
        const FIELD_SEP: &[u8] = b"\x1f";

        let mut hasher = Sha256::new();
        hasher.update(self.title.as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(self.description.as_deref().unwrap_or_default().as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(self.location.as_deref().unwrap_or_default().as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(self.start.timestamp().to_be_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(self.end.timestamp().to_be_bytes());
        hasher.update(FIELD_SEP);
        hasher.update([u8::from(self.all_day)]);
        hex::encode(hasher.finalize())
    }
}

/// Minimal set of changes that brings the stored events for a feed in line
/// with a freshly fetched set. The three sets are disjoint by event UID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventChanges {
    pub to_insert: Vec<CalendarEvent>,
    pub to_update: Vec<CalendarEvent>,
    /// UIDs of events present in the store but absent from the fetched set.
    pub to_delete: Vec<String>,
}

impl EventChanges {
    /// True when applying these changes would be a no-op.
    pub fn is_empty(&self) -> bool {
        self.to_insert.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Total number of mutations across all three sets.
    pub fn len(&self) -> usize {
        self.to_insert.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Outcome of one per-feed sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    Succeeded {
        inserted: usize,
        updated: usize,
        deleted: usize,
        /// Events the parser skipped as individually malformed.
        skipped_items: usize,
    },
    Failed {
        kind: String,
        message: String,
    },
    SkippedOverlap,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Record of one completed (or rejected) sync run for a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub feed_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}
