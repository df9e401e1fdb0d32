use crate::error::listener::ListenerError;
use crate::notifications::{NewNotification, Notification, NotificationKind, NotificationStore, Severity};
use crate::protocol::events;
use crate::protocol::payloads::StationAlertPayload;
use crate::registry::{EventRegistry, Subscription};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const DEFAULT_DISPLAY_DURATION: Duration = Duration::from_secs(5);
const STATION_ALERT_DISPLAY_DURATION: Duration = Duration::from_secs(8);
const STATION_ALERT_TITLE_PREFIX: &str = "Station Alert: ";

/// How a freshly stored notification should be surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Presentation {
    pub severity: Severity,
    pub display_for: Duration,
}

type Presenter = Arc<dyn Fn(&Notification, Presentation) + Send + Sync>;

/// Shape of a `notification` frame.
///
/// Missing and `null` fields both fall back to defaults. A timestamp that is not
/// RFC 3339 is ignored so the store stamps the receipt time.
#[derive(Debug, Deserialize)]
struct NotificationFrame {
    #[serde(rename = "type", default)]
    kind: Option<NotificationKind>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, deserialize_with = "crate::protocol::payloads::optional_string_or_number")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    read: Option<bool>,
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => match DateTime::parse_from_rfc3339(&text) {
            Ok(timestamp) => Ok(Some(timestamp.with_timezone(&Utc))),
            Err(e) => {
                debug!("Ignoring notification timestamp {text:?}: {e}");
                Ok(None)
            }
        },
        Some(other) => {
            debug!("Ignoring non-text notification timestamp {other}");
            Ok(None)
        }
    }
}

/// Registry listeners feeding [`NotificationStore`].
///
/// - `notification` frames are stored with their own type, title and message
/// - `station_alert` frames are stored as [`NotificationKind::StationAlert`]
///   titled `"Station Alert: <station_id>"`
///
/// In both cases the whole frame data is kept as the record's payload.
pub struct NotificationFeed {
    subscriptions: Vec<Subscription>,
}

impl NotificationFeed {
    pub fn attach(registry: &EventRegistry, store: &NotificationStore) -> Self {
        Self::attach_with(registry, store, |_, _| {})
    }

    /// Like [`attach`](Self::attach), also calling `presenter` for every stored record.
    pub fn attach_with<P>(registry: &EventRegistry, store: &NotificationStore, presenter: P) -> Self
    where
        P: Fn(&Notification, Presentation) + Send + Sync + 'static,
    {
        let presenter: Presenter = Arc::new(presenter);

        let notification_store = store.clone();
        let notification_presenter = Arc::clone(&presenter);
        let on_notification = registry.subscribe(events::NOTIFICATION, move |data| {
            let stored = notification_store.add(notification_from_frame(data)?);
            notification_presenter(
                &stored,
                Presentation {
                    severity: stored.kind.severity(),
                    display_for: DEFAULT_DISPLAY_DURATION,
                },
            );
            Ok(())
        });

        let alert_store = store.clone();
        let on_station_alert = registry.subscribe(events::STATION_ALERT, move |data| {
            let stored = alert_store.add(notification_from_station_alert(data)?);
            presenter(
                &stored,
                Presentation {
                    severity: Severity::Warning,
                    display_for: STATION_ALERT_DISPLAY_DURATION,
                },
            );
            Ok(())
        });

        debug!("Notification feed attached");

        Self {
            subscriptions: vec![on_notification, on_station_alert],
        }
    }

    /// Stop feeding the store. Safe to call more than once.
    pub fn detach(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

fn notification_from_frame(data: &Value) -> Result<NewNotification, ListenerError> {
    let frame = NotificationFrame::deserialize(data)
        .map_err(|e| ListenerError::payload(events::NOTIFICATION, e.to_string()))?;

    Ok(NewNotification {
        id: frame.id,
        kind: frame.kind.unwrap_or_default(),
        title: frame.title.unwrap_or_default(),
        message: frame.message.unwrap_or_default(),
        timestamp: frame.timestamp,
        read: frame.read,
        payload: data.clone(),
    })
}

fn notification_from_station_alert(data: &Value) -> Result<NewNotification, ListenerError> {
    let alert = StationAlertPayload::deserialize(data)
        .map_err(|e| ListenerError::payload(events::STATION_ALERT, e.to_string()))?;

    Ok(NewNotification::new(
        NotificationKind::StationAlert,
        format!("{STATION_ALERT_TITLE_PREFIX}{}", alert.station_id),
        alert.message,
    )
    .with_payload(data.clone()))
}
