//! Bounded notification history with read/unread accounting.
//!
//! - [`NotificationStore`] - most-recent-first collection, capped in size
//! - [`NotificationFeed`] - registry listeners that turn `notification` and
//!   `station_alert` frames into store entries
//! - [`Notification`] / [`NewNotification`] - stored record and its partial form

mod feed;
mod notification;
mod store;

pub use feed::{NotificationFeed, Presentation};
pub use notification::{NewNotification, Notification, NotificationKind, Severity};
pub use store::NotificationStore;
