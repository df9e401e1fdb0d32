use crate::notifications::{NewNotification, Notification};

use std::collections::VecDeque;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use log::{debug, trace};

#[derive(Debug, Default)]
struct StoreInner {
    /// Most recent first.
    items: VecDeque<Notification>,
    unread_count: usize,
}

/// Ordered, size-bounded notification history.
///
/// `unread_count` always equals the number of unread records after a mutation
/// returns: evicting an unread record decrements the counter.
///
/// Cheap to clone; all clones share one history.
#[derive(Debug, Clone)]
pub struct NotificationStore {
    inner: Arc<RwLock<StoreInner>>,
    capacity: usize,
}

impl NotificationStore {
    /// Create an empty store holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner::default())),
            capacity: capacity.max(1),
        }
    }

    /// Insert a notification at the front, filling in missing defaults.
    ///
    /// The oldest records are evicted once the store exceeds its capacity.
    pub fn add(&self, notification: NewNotification) -> Notification {
        let notification = notification.into_notification(Utc::now());
        let mut inner = self.write();

        if !notification.read {
            inner.unread_count += 1;
        }
        inner.items.push_front(notification.clone());

        while inner.items.len() > self.capacity {
            if let Some(evicted) = inner.items.pop_back() {
                if !evicted.read {
                    inner.unread_count = inner.unread_count.saturating_sub(1);
                }
                trace!("Evicted notification {}", evicted.id);
            }
        }

        debug!(
            "Notification {} added ({:?}), {} unread",
            notification.id, notification.kind, inner.unread_count
        );
        notification
    }

    /// Mark the record with `id` as read.
    ///
    /// Returns `false` if no unread record has that id.
    pub fn mark_read(&self, id: &str) -> bool {
        let mut inner = self.write();
        let mut changed = 0;

        for notification in inner.items.iter_mut() {
            if notification.id == id && !notification.read {
                notification.read = true;
                changed += 1;
            }
        }

        inner.unread_count = inner.unread_count.saturating_sub(changed);
        changed > 0
    }

    pub fn mark_all_read(&self) {
        let mut inner = self.write();
        inner
            .items
            .iter_mut()
            .for_each(|notification| notification.read = true);
        inner.unread_count = 0;
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.items.clear();
        inner.unread_count = 0;
    }

    /// Snapshot of every record, most recent first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.read().items.iter().cloned().collect()
    }

    /// Snapshot of the unread records, most recent first.
    pub fn unread_notifications(&self) -> Vec<Notification> {
        self.read()
            .items
            .iter()
            .filter(|notification| !notification.read)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.read()
            .items
            .iter()
            .find(|notification| notification.id == id)
            .cloned()
    }

    pub fn unread_count(&self) -> usize {
        self.read().unread_count
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
