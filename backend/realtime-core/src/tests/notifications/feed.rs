// Unit tests for the registry -> store notification feed

use crate::notifications::{
    NotificationFeed, NotificationKind, NotificationStore, Presentation, Severity,
};
use crate::protocol::events;
use crate::registry::EventRegistry;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

fn recording_feed(
    registry: &EventRegistry,
    store: &NotificationStore,
) -> (NotificationFeed, Arc<Mutex<Vec<(String, Presentation)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&seen);
    let feed = NotificationFeed::attach_with(registry, store, move |notification, presentation| {
        s.lock()
            .unwrap()
            .push((notification.title.clone(), presentation));
    });
    (feed, seen)
}

/// **VALUE**: A `notification` frame becomes a stored record with its type, title and message.
///
/// **WHY THIS MATTERS**: This is the path every server notification takes into the
/// notification centre.
///
/// **BUG THIS CATCHES**: Would catch a feed that reads the wrong field names
/// (`kind` instead of `type`) and files everything as generic.
#[test]
fn given_notification_frame_when_dispatched_then_stored_with_severity() {
    // GIVEN: A feed on a fresh store
    let registry = EventRegistry::new();
    let store = NotificationStore::new(50);
    let (_feed, seen) = recording_feed(&registry, &store);

    // WHEN: An ai_response notification arrives
    registry.dispatch(
        events::NOTIFICATION,
        &json!({"type": "ai_response", "title": "Answer ready", "message": "See Q-7", "question_id": 7}),
    );

    // THEN: Stored and presented as success for 5s
    let stored = store.notifications();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].kind, NotificationKind::AiResponse);
    assert_eq!(stored[0].message, "See Q-7");
    assert_eq!(stored[0].payload["question_id"], 7);
    assert_eq!(store.unread_count(), 1);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].0, "Answer ready");
    assert_eq!(seen[0].1.severity, Severity::Success);
    assert_eq!(seen[0].1.display_for, Duration::from_secs(5));
}

/// **VALUE**: Unknown notification types fall back to generic/info.
#[test]
fn given_unknown_type_when_dispatched_then_generic_info() {
    // GIVEN: A feed
    let registry = EventRegistry::new();
    let store = NotificationStore::new(50);
    let (_feed, seen) = recording_feed(&registry, &store);

    // WHEN: A frame with an unknown type arrives
    registry.dispatch(
        events::NOTIFICATION,
        &json!({"type": "maintenance_window", "title": "Heads up", "message": ""}),
    );

    // THEN: Generic, info
    assert_eq!(store.notifications()[0].kind, NotificationKind::Generic);
    assert_eq!(seen.lock().unwrap()[0].1.severity, Severity::Info);
}

/// **VALUE**: A `station_alert` frame is filed as a station alert titled with the station id.
///
/// **BUG THIS CATCHES**: Would catch station alerts being dropped because they are not
/// on the `notification` channel, or shown with the default 5s duration.
#[test]
fn given_station_alert_frame_when_dispatched_then_stored_as_warning() {
    // GIVEN: A feed
    let registry = EventRegistry::new();
    let store = NotificationStore::new(50);
    let (_feed, seen) = recording_feed(&registry, &store);

    // WHEN: A station alert arrives with a numeric id
    registry.dispatch(
        events::STATION_ALERT,
        &json!({"station_id": 12, "message": "Pressure drop"}),
    );

    // THEN: Stored with the derived title, warning for 8s
    let stored = store.notifications();
    assert_eq!(stored[0].kind, NotificationKind::StationAlert);
    assert_eq!(stored[0].title, "Station Alert: 12");
    assert_eq!(stored[0].message, "Pressure drop");
    assert_eq!(stored[0].payload["station_id"], 12);

    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].1.severity, Severity::Warning);
    assert_eq!(seen[0].1.display_for, Duration::from_secs(8));
}

/// **VALUE**: A malformed frame is rejected without touching the store.
#[test]
fn given_malformed_station_alert_when_dispatched_then_not_stored() {
    // GIVEN: A feed
    let registry = EventRegistry::new();
    let store = NotificationStore::new(50);
    let _feed = NotificationFeed::attach(&registry, &store);

    // WHEN: station_id is missing
    let delivered = registry.dispatch(events::STATION_ALERT, &json!({"message": "?"}));

    // THEN: Listener reported failure, nothing stored
    assert_eq!(delivered, 0);
    assert!(store.is_empty());
}

/// **VALUE**: Detaching stops the feed.
#[test]
fn given_detached_feed_when_dispatched_then_store_unchanged() {
    // GIVEN: A detached feed
    let registry = EventRegistry::new();
    let store = NotificationStore::new(50);
    let feed = NotificationFeed::attach(&registry, &store);
    feed.detach();
    feed.detach();

    // WHEN: Frames arrive
    registry.dispatch(events::NOTIFICATION, &json!({"title": "late"}));
    registry.dispatch(events::STATION_ALERT, &json!({"station_id": "A"}));

    // THEN: Nothing stored, no listeners left
    assert!(store.is_empty());
    assert_eq!(registry.listener_count(events::NOTIFICATION), 0);
    assert_eq!(registry.listener_count(events::STATION_ALERT), 0);
}

/// **VALUE**: `null` fields in a notification frame fall back to defaults instead
/// of rejecting the frame.
///
/// **WHY THIS MATTERS**: Servers commonly send `null` for an empty message. The
/// notification must still reach the user.
///
/// **BUG THIS CATCHES**: Would catch `#[serde(default)]` on a plain `String`,
/// which covers missing fields but rejects `null`.
#[test]
fn given_null_fields_when_dispatched_then_stored_with_defaults() {
    // GIVEN: A feed
    let registry = EventRegistry::new();
    let store = NotificationStore::new(50);
    let _feed = NotificationFeed::attach(&registry, &store);

    // WHEN: Frames with null message, null title/type/read, and a null alert message
    let delivered = [
        registry.dispatch(
            events::NOTIFICATION,
            &json!({"type": "ai_response", "title": "t", "message": null}),
        ),
        registry.dispatch(
            events::NOTIFICATION,
            &json!({"type": null, "title": null, "message": "m", "read": null}),
        ),
        registry.dispatch(
            events::STATION_ALERT,
            &json!({"station_id": 4, "message": null}),
        ),
    ];

    // THEN: All three stored
    assert_eq!(delivered, [1, 1, 1]);
    let stored = store.notifications();
    assert_eq!(stored.len(), 3);

    // AND: Defaults filled (most recent first)
    assert_eq!(stored[0].title, "Station Alert: 4");
    assert_eq!(stored[0].message, "");
    assert_eq!(stored[1].kind, NotificationKind::Generic);
    assert_eq!(stored[1].title, "");
    assert!(!stored[1].read);
    assert_eq!(stored[2].kind, NotificationKind::AiResponse);
    assert_eq!(stored[2].message, "");
    assert_eq!(store.unread_count(), 3);
}

/// **VALUE**: A timestamp that is not RFC 3339 is replaced by the receipt time;
/// a valid one is kept.
///
/// **WHY THIS MATTERS**: The timestamp is optional metadata. A server sending
/// epoch millis must not lose the notification itself.
///
/// **BUG THIS CATCHES**: Would catch a strict `DateTime` field that rejects the
/// whole frame over its timestamp.
#[test]
fn given_unparseable_timestamp_when_dispatched_then_receipt_time_used() {
    // GIVEN: A feed
    let registry = EventRegistry::new();
    let store = NotificationStore::new(50);
    let _feed = NotificationFeed::attach(&registry, &store);
    let before = Utc::now();

    // WHEN: One epoch-millis timestamp, one garbage string, one RFC 3339
    registry.dispatch(
        events::NOTIFICATION,
        &json!({"id": "n-1", "title": "millis", "timestamp": 1700000000000_u64}),
    );
    registry.dispatch(
        events::NOTIFICATION,
        &json!({"id": "n-2", "title": "text", "timestamp": "yesterday"}),
    );
    registry.dispatch(
        events::NOTIFICATION,
        &json!({"id": "n-3", "title": "valid", "timestamp": "2024-05-01T12:00:00Z"}),
    );
    let after = Utc::now();

    // THEN: All stored
    assert_eq!(store.len(), 3);

    // AND: Unparseable timestamps became the receipt time
    for id in ["n-1", "n-2"] {
        let timestamp = store.get(id).unwrap().timestamp;
        assert!(
            timestamp >= before && timestamp <= after,
            "{id} should carry the receipt time, got {timestamp}"
        );
    }

    // AND: The valid timestamp was kept
    assert_eq!(
        store.get("n-3").unwrap().timestamp,
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    );
}
