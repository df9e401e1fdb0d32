use crate::registry::Table;

use std::sync::{Mutex, PoisonError, Weak};

use log::trace;

/// Handle to one registration in an [`EventRegistry`](super::EventRegistry).
///
/// [`unsubscribe`](Self::unsubscribe) removes exactly that registration and is
/// safe to call any number of times. Dropping the handle does **not**
/// unsubscribe; a listener registered for the lifetime of the process can simply
/// let its handle go.
#[derive(Debug, Clone)]
pub struct Subscription {
    table: Weak<Mutex<Table>>,
    event_type: String,
    id: u64,
}

impl Subscription {
    pub(crate) fn new(table: Weak<Mutex<Table>>, event_type: &str, id: u64) -> Self {
        Self {
            table,
            event_type: event_type.to_string(),
            id,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Remove the registration. Returns `true` only on the call that removed it.
    pub fn unsubscribe(&self) -> bool {
        let Some(table) = self.table.upgrade() else {
            return false;
        };
        let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);

        let Some(registrations) = table.get_mut(&self.event_type) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|registration| registration.id != self.id);
        let removed = registrations.len() != before;

        if registrations.is_empty() {
            table.remove(&self.event_type);
        }

        if removed {
            trace!("Listener {} unsubscribed from '{}'", self.id, self.event_type);
        }

        removed
    }

    pub fn is_active(&self) -> bool {
        self.table.upgrade().is_some_and(|table| {
            table
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&self.event_type)
                .is_some_and(|registrations| registrations.iter().any(|r| r.id == self.id))
        })
    }
}
