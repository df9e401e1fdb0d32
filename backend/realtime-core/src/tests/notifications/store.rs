// Unit tests for the bounded notification store

use crate::notifications::{NewNotification, NotificationKind, NotificationStore};

use chrono::{TimeZone, Utc};

fn generic(title: &str) -> NewNotification {
    NewNotification::new(NotificationKind::Generic, title, "")
}

/// **VALUE**: New records go to the front and count as unread.
///
/// **BUG THIS CATCHES**: Would catch appending instead of prepending, which would show
/// the oldest notification first in the list.
#[test]
fn given_empty_store_when_add_then_newest_first_and_unread() {
    // GIVEN: An empty store
    let store = NotificationStore::new(50);

    // WHEN: Two records are added
    store.add(generic("first"));
    store.add(generic("second"));

    // THEN: Newest first, both unread
    let titles: Vec<String> = store.notifications().into_iter().map(|n| n.title).collect();
    assert_eq!(titles, ["second", "first"]);
    assert_eq!(store.unread_count(), 2);
}

/// **VALUE**: Missing id, timestamp and read flag are filled in on insert.
///
/// **BUG THIS CATCHES**: Would catch records stored with empty ids, which would make
/// `mark_read` match every id-less record at once.
#[test]
fn given_partial_record_when_add_then_defaults_filled() {
    // GIVEN: A record without id/timestamp/read
    let store = NotificationStore::new(5);
    let before = Utc::now();

    // WHEN: Added twice
    let a = store.add(generic("a"));
    let b = store.add(generic("b"));

    // THEN: Distinct generated ids, receipt timestamps, unread
    assert!(!a.id.is_empty());
    assert_ne!(a.id, b.id);
    assert!(a.timestamp >= before);
    assert!(!a.read);
}

/// **VALUE**: Server-supplied id and timestamp are kept.
#[test]
fn given_full_record_when_add_then_fields_preserved() {
    // GIVEN: A record with id and timestamp
    let store = NotificationStore::new(5);
    let timestamp = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();

    // WHEN: Added
    let stored = store.add(generic("x").with_id("n-1").with_timestamp(timestamp));

    // THEN: Preserved
    assert_eq!(stored.id, "n-1");
    assert_eq!(stored.timestamp, timestamp);
    assert_eq!(store.get("n-1"), Some(stored));
}

/// **VALUE**: Capacity is enforced by evicting the oldest record.
///
/// **WHY THIS MATTERS**: Notifications stream in for the whole session; without a
/// bound the list (and the UI rendering it) grows forever.
///
/// **BUG THIS CATCHES**: Would catch eviction from the wrong end, or an off-by-one
/// that lets the store hold capacity + 1 records.
#[test]
fn given_full_store_when_add_then_oldest_evicted() {
    // GIVEN: A store at capacity 3
    let store = NotificationStore::new(3);
    for title in ["1", "2", "3"] {
        store.add(generic(title));
    }

    // WHEN: A fourth record arrives
    store.add(generic("4"));

    // THEN: The oldest is gone
    let titles: Vec<String> = store.notifications().into_iter().map(|n| n.title).collect();
    assert_eq!(titles, ["4", "3", "2"]);
    assert_eq!(store.len(), 3);
}

/// **VALUE**: Evicting an unread record keeps the unread count honest.
///
/// **WHY THIS MATTERS**: The badge shows `unread_count`. If evictions did not
/// decrement it, the badge would claim unread items that no longer exist.
///
/// **BUG THIS CATCHES**: Would catch a counter that only ever grows on `add`.
#[test]
fn given_unread_records_when_evicted_then_unread_count_matches_contents() {
    // GIVEN: Capacity 2, both unread
    let store = NotificationStore::new(2);
    store.add(generic("1"));
    store.add(generic("2"));

    // WHEN: A third unread record evicts the first
    store.add(generic("3"));

    // THEN: Count equals the unread records actually held
    assert_eq!(store.unread_count(), 2);
    assert_eq!(store.unread_count(), store.unread_notifications().len());
}

/// **VALUE**: Evicting an already-read record leaves the unread count alone.
#[test]
fn given_read_oldest_when_evicted_then_unread_count_unchanged() {
    // GIVEN: Oldest record read
    let store = NotificationStore::new(2);
    let oldest = store.add(generic("1"));
    store.add(generic("2"));
    store.mark_read(&oldest.id);
    assert_eq!(store.unread_count(), 1);

    // WHEN: It gets evicted
    store.add(generic("3"));

    // THEN: Two unread remain
    assert_eq!(store.unread_count(), 2);
}

/// **VALUE**: A record inserted as already read does not bump the counter.
#[test]
fn given_read_record_when_add_then_unread_count_unchanged() {
    // GIVEN: An empty store
    let store = NotificationStore::new(5);

    // WHEN: A read record is inserted
    store.add(generic("seen").with_read(true));

    // THEN: Nothing unread
    assert_eq!(store.unread_count(), 0);
}

/// **VALUE**: `mark_read` decrements once and is a no-op for read or unknown ids.
///
/// **BUG THIS CATCHES**: Would catch double-decrement when the same id is marked
/// twice, which would drive the badge below the true count.
#[test]
fn given_unread_record_when_mark_read_twice_then_decrements_once() {
    // GIVEN: Two unread records
    let store = NotificationStore::new(5);
    let target = store.add(generic("a"));
    store.add(generic("b"));

    // WHEN: Marked twice, plus an unknown id
    let first = store.mark_read(&target.id);
    let second = store.mark_read(&target.id);
    let unknown = store.mark_read("missing");

    // THEN: One decrement
    assert!(first);
    assert!(!second);
    assert!(!unknown);
    assert_eq!(store.unread_count(), 1);
    assert!(store.get(&target.id).is_some_and(|n| n.read));
}

/// **VALUE**: `mark_all_read` and `clear` reset the counter.
#[test]
fn given_unread_records_when_mark_all_read_and_clear_then_counter_zero() {
    // GIVEN: Three unread
    let store = NotificationStore::new(5);
    for title in ["a", "b", "c"] {
        store.add(generic(title));
    }

    // WHEN: All marked read
    store.mark_all_read();

    // THEN: Zero unread, records kept
    assert_eq!(store.unread_count(), 0);
    assert_eq!(store.len(), 3);

    // WHEN: Cleared
    store.add(generic("d"));
    store.clear();

    // THEN: Empty and zero
    assert!(store.is_empty());
    assert_eq!(store.unread_count(), 0);
}

/// **VALUE**: A zero capacity is clamped so the store can still hold the newest record.
#[test]
fn given_zero_capacity_when_new_then_clamped_to_one() {
    // GIVEN/WHEN: Zero capacity
    let store = NotificationStore::new(0);
    store.add(generic("a"));
    store.add(generic("b"));

    // THEN: Holds exactly the newest
    assert_eq!(store.capacity(), 1);
    assert_eq!(store.notifications()[0].title, "b");
}

/// **VALUE**: Clones share one store.
#[test]
fn given_cloned_store_when_add_through_clone_then_visible_in_original() {
    // GIVEN: A store and its clone
    let store = NotificationStore::new(5);
    let clone = store.clone();

    // WHEN: Added through the clone
    clone.add(NewNotification::new(NotificationKind::AiResponse, "Answer", "ready"));

    // THEN: Seen by the original
    assert_eq!(store.len(), 1);
    assert_eq!(store.unread_count(), 1);
}
