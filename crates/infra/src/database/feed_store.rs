//! SQLite implementation of the feed store port.
//!
//! Feeds own their events; `calendar_events` carries a composite primary key
//! of `(feed_id, uid)` and cascades on feed deletion. `apply_changes` runs the
//! whole change set inside one transaction so a feed is never left
//! half-reconciled.

use async_trait::async_trait;
use bookingsync_core::FeedStore;
use bookingsync_domain::{
    CalendarEvent, EventChanges, Feed, FeedSyncStatus, RunOutcome, StoreError, SyncRun,
};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use tracing::{debug, instrument};

use crate::database::SqlitePool;
use crate::errors::InfraError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS feeds (
    id TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    name TEXT,
    sync_interval_secs INTEGER NOT NULL,
    last_synced_at TEXT,
    last_status TEXT,
    last_message TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS calendar_events (
    feed_id TEXT NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    uid TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT,
    location TEXT,
    start_ts INTEGER NOT NULL,
    end_ts INTEGER NOT NULL,
    all_day INTEGER NOT NULL,
    fingerprint TEXT NOT NULL,
    PRIMARY KEY (feed_id, uid)
);

CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    feed_id TEXT NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    outcome TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_feed ON sync_runs(feed_id, finished_at);
";

/// Feed store backed by a pooled SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteFeedStore {
    pool: SqlitePool,
}

impl SqliteFeedStore {
    /// Open the store and create the schema if it does not exist yet.
    pub fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute_batch(SCHEMA).map_err(InfraError::from)?;
        Ok(())
    }

    /// Most recent recorded runs for a feed, newest first.
    pub fn recent_runs(&self, feed_id: &str, limit: usize) -> Result<Vec<SyncRun>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(
                "SELECT feed_id, started_at, finished_at, outcome
                 FROM sync_runs WHERE feed_id = ?1
                 ORDER BY finished_at DESC LIMIT ?2",
            )
            .map_err(InfraError::from)?;

        let rows = stmt
            .query_map(params![feed_id, limit], row_to_run)
            .map_err(InfraError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(InfraError::from)?;
        Ok(rows)
    }
}

#[async_trait]
impl FeedStore for SqliteFeedStore {
    #[instrument(skip(self))]
    async fn list_feeds(&self) -> Result<Vec<Feed>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, url, name, sync_interval_secs, last_synced_at,
                        last_status, last_message, created_at
                 FROM feeds ORDER BY created_at",
            )
            .map_err(InfraError::from)?;

        let feeds = stmt
            .query_map([], row_to_feed)
            .map_err(InfraError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(InfraError::from)?;
        Ok(feeds)
    }

    #[instrument(skip(self))]
    async fn get_feed(&self, feed_id: &str) -> Result<Option<Feed>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, url, name, sync_interval_secs, last_synced_at,
                        last_status, last_message, created_at
                 FROM feeds WHERE id = ?1",
            )
            .map_err(InfraError::from)?;

        let mut rows = stmt.query_map(params![feed_id], row_to_feed).map_err(InfraError::from)?;
        match rows.next() {
            Some(feed) => Ok(Some(feed.map_err(InfraError::from)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self, feed), fields(feed_id = %feed.id))]
    async fn insert_feed(&self, feed: &Feed) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO feeds (id, url, name, sync_interval_secs, last_synced_at,
                                last_status, last_message, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                feed.id,
                feed.url,
                feed.name,
                feed.sync_interval_secs,
                feed.last_synced_at.map(|t| t.to_rfc3339()),
                feed.last_status.as_ref().map(status_to_str),
                feed.last_message,
                feed.created_at.to_rfc3339(),
            ],
        )
        .map_err(InfraError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_feed(&self, feed_id: &str) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        let deleted = conn
            .execute("DELETE FROM feeds WHERE id = ?1", params![feed_id])
            .map_err(InfraError::from)?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("feed {feed_id}")));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_events(&self, feed_id: &str) -> Result<Vec<CalendarEvent>, StoreError> {
        let conn = self.pool.get()?;
        let mut stmt = conn
            .prepare(
                "SELECT uid, title, description, location, start_ts, end_ts,
                        all_day, fingerprint
                 FROM calendar_events WHERE feed_id = ?1 ORDER BY start_ts",
            )
            .map_err(InfraError::from)?;

        let events = stmt
            .query_map(params![feed_id], row_to_event)
            .map_err(InfraError::from)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(InfraError::from)?;
        Ok(events)
    }

    #[instrument(skip(self, changes), fields(mutations = changes.len()))]
    async fn apply_changes(&self, feed_id: &str, changes: &EventChanges) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.get()?;
        let tx = conn.transaction().map_err(InfraError::from)?;

        apply_changes_tx(&tx, feed_id, changes).map_err(|e| {
            // Rollback happens on drop; surface the original failure.
            StoreError::Transaction(StoreError::from(e).to_string())
        })?;

        tx.commit()
            .map_err(|e| StoreError::Transaction(StoreError::from(InfraError::from(e)).to_string()))?;

        debug!(
            inserted = changes.to_insert.len(),
            updated = changes.to_update.len(),
            deleted = changes.to_delete.len(),
            "event changes applied"
        );
        Ok(())
    }

    #[instrument(skip(self, run), fields(feed_id = %feed_id))]
    async fn record_run_outcome(&self, feed_id: &str, run: &SyncRun) -> Result<(), StoreError> {
        let outcome_json = serde_json::to_string(&run.outcome)
            .map_err(|e| StoreError::Query(format!("failed to serialize run outcome: {e}")))?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction().map_err(InfraError::from)?;

        tx.execute(
            "INSERT INTO sync_runs (feed_id, started_at, finished_at, outcome)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                feed_id,
                run.started_at.to_rfc3339(),
                run.finished_at.to_rfc3339(),
                outcome_json,
            ],
        )
        .map_err(InfraError::from)?;

        let (status, message) = outcome_summary(&run.outcome);
        if run.outcome.is_success() {
            // Only a successful run advances the cadence clock; failures
            // leave last_synced_at alone so the next tick retries.
            tx.execute(
                "UPDATE feeds SET last_synced_at = ?2, last_status = ?3, last_message = ?4
                 WHERE id = ?1",
                params![feed_id, run.finished_at.to_rfc3339(), status, message],
            )
            .map_err(InfraError::from)?;
        } else {
            tx.execute(
                "UPDATE feeds SET last_status = ?2, last_message = ?3 WHERE id = ?1",
                params![feed_id, status, message],
            )
            .map_err(InfraError::from)?;
        }

        tx.commit().map_err(InfraError::from)?;
        Ok(())
    }
}

fn apply_changes_tx(
    tx: &Connection,
    feed_id: &str,
    changes: &EventChanges,
) -> Result<(), InfraError> {
    {
        let mut delete = tx.prepare("DELETE FROM calendar_events WHERE feed_id = ?1 AND uid = ?2")?;
        for uid in &changes.to_delete {
            delete.execute(params![feed_id, uid])?;
        }
    }

    {
        let mut insert = tx.prepare(
            "INSERT INTO calendar_events
                (feed_id, uid, title, description, location, start_ts, end_ts, all_day, fingerprint)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )?;
        for event in &changes.to_insert {
            insert.execute(params![
                feed_id,
                event.uid,
                event.title,
                event.description,
                event.location,
                event.start.timestamp(),
                event.end.timestamp(),
                event.all_day,
                event.fingerprint,
            ])?;
        }
    }

    {
        let mut update = tx.prepare(
            "UPDATE calendar_events
             SET title = ?3, description = ?4, location = ?5, start_ts = ?6,
                 end_ts = ?7, all_day = ?8, fingerprint = ?9
             WHERE feed_id = ?1 AND uid = ?2",
        )?;
        for event in &changes.to_update {
            update.execute(params![
                feed_id,
                event.uid,
                event.title,
                event.description,
                event.location,
                event.start.timestamp(),
                event.end.timestamp(),
                event.all_day,
                event.fingerprint,
            ])?;
        }
    }

    Ok(())
}

fn status_to_str(status: &FeedSyncStatus) -> &'static str {
    match status {
        FeedSyncStatus::Success => "success",
        FeedSyncStatus::Failure => "failure",
    }
}

fn outcome_summary(outcome: &RunOutcome) -> (&'static str, String) {
    match outcome {
        RunOutcome::Succeeded { inserted, updated, deleted, skipped_items } => (
            "success",
            format!("{inserted} inserted, {updated} updated, {deleted} deleted, {skipped_items} skipped"),
        ),
        RunOutcome::Failed { kind, message } => ("failure", format!("{kind}: {message}")),
        RunOutcome::SkippedOverlap => ("failure", "skipped: previous run still in flight".to_string()),
    }
}

fn row_to_feed(row: &Row<'_>) -> rusqlite::Result<Feed> {
    Ok(Feed {
        id: row.get(0)?,
        url: row.get(1)?,
        name: row.get(2)?,
        sync_interval_secs: row.get(3)?,
        last_synced_at: row.get::<_, Option<String>>(4)?.map(|s| parse_rfc3339(4, &s)).transpose()?,
        last_status: row.get::<_, Option<String>>(5)?.map(|s| parse_status(5, &s)).transpose()?,
        last_message: row.get(6)?,
        created_at: parse_rfc3339(7, &row.get::<_, String>(7)?)?,
    })
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<CalendarEvent> {
    Ok(CalendarEvent {
        uid: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        location: row.get(3)?,
        start: unix_ts(4, row.get(4)?)?,
        end: unix_ts(5, row.get(5)?)?,
        all_day: row.get(6)?,
        fingerprint: row.get(7)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<SyncRun> {
    let outcome_json: String = row.get(3)?;
    let outcome = serde_json::from_str(&outcome_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e))
    })?;
    Ok(SyncRun {
        feed_id: row.get(0)?,
        started_at: parse_rfc3339(1, &row.get::<_, String>(1)?)?,
        finished_at: parse_rfc3339(2, &row.get::<_, String>(2)?)?,
        outcome,
    })
}

fn parse_rfc3339(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_status(idx: usize, value: &str) -> rusqlite::Result<FeedSyncStatus> {
    match value {
        "success" => Ok(FeedSyncStatus::Success),
        "failure" => Ok(FeedSyncStatus::Failure),
        other => Err(rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unrecognized feed status: {other}").into(),
        )),
    }
}

fn unix_ts(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}
