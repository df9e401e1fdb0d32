//! Publish/subscribe table for inbound events.
//!
//! The registry maps event-type names to the listeners interested in them.
//! The connection manager calls [`EventRegistry::dispatch`] for every inbound
//! frame; consumers (notification feed, pipeline driver, application code)
//! register listeners once and keep receiving across reconnects, because the
//! registry is independent of the connection.
//!
//! # Failure isolation
//!
//! Each listener call runs in its own boundary: an `Err` return is logged, a
//! panic is caught with `catch_unwind`, and delivery continues with the next
//! listener.
//!
//! # Locking
//!
//! The table lock is never held while a listener runs, so listeners may
//! subscribe or unsubscribe (themselves or others) from inside a dispatch.

mod subscription;

pub use subscription::Subscription;

use crate::error::listener::ListenerError;

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, trace, warn};
use serde_json::Value;

/// A shareable event callback.
///
/// Identity is the `Arc` allocation: registering the same `Listener` twice for
/// one event type keeps a single registration.
pub type Listener = Arc<dyn Fn(&Value) -> Result<(), ListenerError> + Send + Sync>;

/// Wrap a closure as a [`Listener`].
pub fn listener<F>(callback: F) -> Listener
where
    F: Fn(&Value) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(callback)
}

pub(crate) struct Registration {
    pub(crate) id: u64,
    pub(crate) listener: Listener,
}

pub(crate) type Table = HashMap<String, Vec<Registration>>;

/// Event-type → listeners table.
///
/// Cheap to clone; all clones share one table.
#[derive(Clone, Default)]
pub struct EventRegistry {
    table: Arc<Mutex<Table>>,
    next_id: Arc<AtomicU64>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a closure for `event_type`.
    pub fn subscribe<F>(&self, event_type: &str, callback: F) -> Subscription
    where
        F: Fn(&Value) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.subscribe_listener(event_type, listener(callback))
    }

    /// Register an existing [`Listener`] for `event_type`.
    ///
    /// If the same listener is already registered for this type, the existing
    /// registration is reused and the returned handle refers to it.
    pub fn subscribe_listener(&self, event_type: &str, listener: Listener) -> Subscription {
        let mut table = self.table();
        let registrations = table.entry(event_type.to_string()).or_default();

        let id = match registrations
            .iter()
            .find(|registration| Arc::ptr_eq(&registration.listener, &listener))
        {
            Some(existing) => existing.id,
            None => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                registrations.push(Registration { id, listener });
                id
            }
        };

        trace!("Listener {id} subscribed to '{event_type}'");
        Subscription::new(Arc::downgrade(&self.table), event_type, id)
    }

    /// Remove `listener` from `event_type`.
    ///
    /// Returns `true` if a registration was removed.
    pub fn unsubscribe(&self, event_type: &str, listener: &Listener) -> bool {
        let mut table = self.table();
        let Some(registrations) = table.get_mut(event_type) else {
            return false;
        };

        let before = registrations.len();
        registrations.retain(|registration| !Arc::ptr_eq(&registration.listener, listener));
        let removed = registrations.len() != before;

        if registrations.is_empty() {
            table.remove(event_type);
        }

        removed
    }

    /// Deliver `data` to every listener currently registered for `event_type`.
    ///
    /// Returns the number of listeners that handled the event without error.
    pub fn dispatch(&self, event_type: &str, data: &Value) -> usize {
        let snapshot: Vec<(u64, Listener)> = match self.table().get(event_type) {
            Some(registrations) => registrations
                .iter()
                .map(|registration| (registration.id, Arc::clone(&registration.listener)))
                .collect(),
            None => {
                trace!("No listeners for '{event_type}'");
                return 0;
            }
        };

        let mut delivered = 0;

        for (id, listener) in snapshot {
            // Skip listeners removed by an earlier listener in this same dispatch.
            if !self.is_registered(event_type, id) {
                continue;
            }

            match catch_unwind(AssertUnwindSafe(|| listener(data))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!("Listener {id} for '{event_type}' failed: {e}"),
                Err(_) => error!("Listener {id} for '{event_type}' panicked"),
            }
        }

        delivered
    }

    pub fn listener_count(&self, event_type: &str) -> usize {
        self.table().get(event_type).map_or(0, Vec::len)
    }

    fn is_registered(&self, event_type: &str, id: u64) -> bool {
        self.table()
            .get(event_type)
            .is_some_and(|registrations| registrations.iter().any(|r| r.id == id))
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
