use bookingsync_infra::database::{SqliteFeedStore, SqlitePool};
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

/// Temporary SQLite-backed feed store that keeps its directory alive for the
/// duration of a test run.
pub struct TestStore {
    pub store: SqliteFeedStore,
    _temp_dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let pool = SqlitePool::open_at(&temp_dir.path().join("test.db"), 2)
            .expect("pool should open");
        let store = SqliteFeedStore::new(pool).expect("schema should initialize");
        Self { store, _temp_dir: temp_dir }
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A booking window `days_out` days from now, lasting `nights` nights.
pub fn window(days_out: i64, nights: i64) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = Utc::now() + Duration::days(days_out);
    (start, start + Duration::days(nights))
}

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

/// One VEVENT block with explicit start and end.
pub fn vevent(uid: &str, summary: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    format!(
        "BEGIN:VEVENT\r\nUID:{uid}\r\nSUMMARY:{summary}\r\nDTSTART:{}\r\nDTEND:{}\r\nEND:VEVENT\r\n",
        format_ts(start),
        format_ts(end),
    )
}

/// A full VCALENDAR document wrapping the given VEVENT blocks.
pub fn calendar(events: &[String]) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//BookingSync Tests//EN\r\n{}END:VCALENDAR\r\n",
        events.concat(),
    )
}
