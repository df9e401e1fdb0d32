use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Category of a notification.
///
/// Unknown categories sent by the server fall back to [`NotificationKind::Generic`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[serde(alias = "ai-response")]
    AiResponse,
    #[serde(alias = "station-alert")]
    StationAlert,
    #[serde(alias = "ticket-escalation")]
    TicketEscalation,
    #[default]
    #[serde(other)]
    Generic,
}

/// How prominently a notification should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Error,
}

impl NotificationKind {
    pub fn severity(self) -> Severity {
        match self {
            NotificationKind::AiResponse => Severity::Success,
            NotificationKind::StationAlert => Severity::Warning,
            NotificationKind::TicketEscalation => Severity::Error,
            NotificationKind::Generic => Severity::Info,
        }
    }
}

/// A stored notification record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub read: bool,
    #[serde(default)]
    pub payload: Value,
}

/// A notification before the store fills in its defaults.
///
/// `id` defaults to a fresh UUID, `timestamp` to the time of insertion and
/// `read` to `false`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewNotification {
    pub id: Option<String>,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub read: Option<bool>,
    pub payload: Value,
}

impl NewNotification {
    pub fn new(kind: NotificationKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_read(mut self, read: bool) -> Self {
        self.read = Some(read);
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub(crate) fn into_notification(self, received_at: DateTime<Utc>) -> Notification {
        Notification {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: self.kind,
            title: self.title,
            message: self.message,
            timestamp: self.timestamp.unwrap_or(received_at),
            read: self.read.unwrap_or(false),
            payload: self.payload,
        }
    }
}
