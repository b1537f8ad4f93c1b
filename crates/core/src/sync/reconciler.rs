//! Event reconciler.
//!
//! Computes the minimal insert/update/delete set that brings the stored
//! events for a feed in line with a freshly fetched set. Pure function, no
//! I/O; linear in the number of events via a hash-map join keyed by the
//! external event UID.

use std::collections::HashMap;

use bookingsync_domain::{CalendarEvent, EventChanges};

/// Diff `stored` against `fetched`, keyed by event UID.
///
/// - present only in `fetched` -> insert
/// - present only in `stored` -> delete
/// - present in both with differing fingerprints -> update
/// - present in both with identical fingerprints -> untouched
///
/// If the fetched set contains duplicate UIDs the last occurrence wins,
/// mirroring the at-most-one-event-per-UID store invariant.
pub fn reconcile(stored: &[CalendarEvent], fetched: &[CalendarEvent]) -> EventChanges {
    let stored_by_uid: HashMap<&str, &CalendarEvent> =
        stored.iter().map(|event| (event.uid.as_str(), event)).collect();

    let mut fetched_by_uid: HashMap<&str, &CalendarEvent> = HashMap::with_capacity(fetched.len());
    let mut fetched_order: Vec<&str> = Vec::with_capacity(fetched.len());
    for event in fetched {
        if fetched_by_uid.insert(event.uid.as_str(), event).is_none() {
            fetched_order.push(event.uid.as_str());
        }
    }

    let mut changes = EventChanges::default();

    for uid in fetched_order {
        let event = fetched_by_uid[uid];
        match stored_by_uid.get(uid) {
            None => changes.to_insert.push(event.clone()),
            Some(existing) if existing.fingerprint != event.fingerprint => {
                changes.to_update.push(event.clone());
            }
            Some(_) => {}
        }
    }

    for event in stored {
        if !fetched_by_uid.contains_key(event.uid.as_str()) {
            changes.to_delete.push(event.uid.clone());
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use bookingsync_domain::CalendarEvent;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    fn event(uid: &str, title: &str, start: i64) -> CalendarEvent {
        CalendarEvent::new(uid, title, None, None, ts(start), ts(start + 86_400), false)
    }

    /// Replay computed changes against the stored set.
    fn apply(stored: &[CalendarEvent], changes: &EventChanges) -> Vec<CalendarEvent> {
        let mut result: BTreeMap<String, CalendarEvent> =
            stored.iter().map(|e| (e.uid.clone(), e.clone())).collect();
        for uid in &changes.to_delete {
            result.remove(uid);
        }
        for e in changes.to_insert.iter().chain(&changes.to_update) {
            result.insert(e.uid.clone(), e.clone());
        }
        result.into_values().collect()
    }

    fn as_sorted_uids(events: &[CalendarEvent]) -> Vec<(String, String)> {
        let mut pairs: Vec<_> =
            events.iter().map(|e| (e.uid.clone(), e.fingerprint.clone())).collect();
        pairs.sort();
        pairs
    }

    #[test]
    fn new_event_is_inserted() {
        let stored = vec![event("e1", "Reserved", 1_700_000_000)];
        let fetched = vec![event("e1", "Reserved", 1_700_000_000), event("e2", "Blocked", 1_700_100_000)];

        let changes = reconcile(&stored, &fetched);

        assert_eq!(changes.to_insert.len(), 1);
        assert_eq!(changes.to_insert[0].uid, "e2");
        assert!(changes.to_update.is_empty());
        assert!(changes.to_delete.is_empty());
        assert_eq!(as_sorted_uids(&apply(&stored, &changes)), as_sorted_uids(&fetched));
    }

    #[test]
    fn changed_and_vanished_events_update_and_delete() {
        let stored = vec![event("e1", "Reserved", 1_700_000_000), event("e2", "Blocked", 1_700_100_000)];
        let fetched = vec![event("e1", "Reserved - extended", 1_700_000_000)];

        let changes = reconcile(&stored, &fetched);

        assert_eq!(changes.to_update.len(), 1);
        assert_eq!(changes.to_update[0].uid, "e1");
        assert_eq!(changes.to_delete, vec!["e2".to_string()]);
        assert!(changes.to_insert.is_empty());
        assert_eq!(as_sorted_uids(&apply(&stored, &changes)), as_sorted_uids(&fetched));
    }

    #[test]
    fn identical_sets_are_a_no_op() {
        let stored = vec![event("e1", "Reserved", 1_700_000_000), event("e2", "Blocked", 1_700_100_000)];
        let changes = reconcile(&stored, &stored.clone());
        assert!(changes.is_empty());
    }

    #[test]
    fn reconcile_is_idempotent() {
        let stored = vec![event("e1", "Reserved", 1_700_000_000), event("e3", "Old", 1_699_000_000)];
        let fetched = vec![event("e1", "Changed", 1_700_000_000), event("e2", "New", 1_700_200_000)];

        let first = reconcile(&stored, &fetched);
        let updated = apply(&stored, &first);
        let second = reconcile(&updated, &fetched);

        assert!(second.is_empty(), "second pass produced changes: {second:?}");
    }

    #[test]
    fn round_trip_reconstructs_fetched_set() {
        let stored: Vec<_> =
            (0..50).map(|i| event(&format!("keep-{i}"), "Reserved", 1_700_000_000 + i * 100)).collect();
        let mut fetched: Vec<_> = stored[10..40].to_vec();
        fetched.extend((0..20).map(|i| event(&format!("new-{i}"), "New", 1_701_000_000 + i * 100)));
        fetched[0] = event(&fetched[0].uid.clone(), "Rewritten", 1_702_000_000);

        let changes = reconcile(&stored, &fetched);

        // The three sets are disjoint by UID.
        let mut all_uids: Vec<&str> = changes
            .to_insert
            .iter()
            .map(|e| e.uid.as_str())
            .chain(changes.to_update.iter().map(|e| e.uid.as_str()))
            .chain(changes.to_delete.iter().map(String::as_str))
            .collect();
        let before = all_uids.len();
        all_uids.sort_unstable();
        all_uids.dedup();
        assert_eq!(before, all_uids.len());

        assert_eq!(as_sorted_uids(&apply(&stored, &changes)), as_sorted_uids(&fetched));
    }

    #[test]
    fn empty_fetched_set_deletes_everything() {
        let stored = vec![event("e1", "Reserved", 1_700_000_000)];
        let changes = reconcile(&stored, &[]);
        assert_eq!(changes.to_delete, vec!["e1".to_string()]);
        assert!(apply(&stored, &changes).is_empty());
    }

    #[test]
    fn duplicate_fetched_uids_last_occurrence_wins() {
        let stored = vec![];
        let fetched = vec![event("e1", "First", 1_700_000_000), event("e1", "Second", 1_700_100_000)];

        let changes = reconcile(&stored, &fetched);

        assert_eq!(changes.to_insert.len(), 1);
        assert_eq!(changes.to_insert[0].title, "Second");
    }
}
