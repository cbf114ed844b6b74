//! Synchronous observer registry shared by the stores.
//!
//! Both stores notify their listeners synchronously after every state
//! change; a listener unsubscribes by dropping the [`Subscription`] guard.
//! There is no queue and no replay: a listener sees every change that
//! happens while it is registered, in order, on the thread (or task) that
//! made the change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;
type CallbackMap<T> = Mutex<HashMap<u64, Callback<T>>>;

/// A set of listeners interested in a store's state changes.
pub(crate) struct ListenerSet<T> {
    callbacks: Arc<CallbackMap<T>>,
    next_id: AtomicU64,
}

impl<T> Default for ListenerSet<T> {
    fn default() -> Self {
        Self {
            callbacks: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }
}

impl<T> ListenerSet<T> {
    /// Register a listener; it stays registered until the returned guard
    /// is dropped.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) -> Subscription<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(listener));
        Subscription {
            id,
            callbacks: Arc::downgrade(&self.callbacks),
        }
    }

    /// Invoke every registered listener with the new state.
    ///
    /// The registry lock is released before any listener runs, so a
    /// listener may subscribe or drop a [`Subscription`] without
    /// deadlocking.
    pub fn notify(&self, state: &T) {
        let snapshot: Vec<Callback<T>> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(Arc::clone)
            .collect();
        for callback in snapshot {
            callback(state);
        }
    }
}

/// RAII unsubscribe handle returned by a store's `subscribe`.
///
/// Dropping it removes the listener; dropping it after the store is gone
/// is a no-op.
#[must_use = "dropping the subscription immediately unsubscribes the listener"]
pub struct Subscription<T> {
    id: u64,
    callbacks: Weak<CallbackMap<T>>,
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(callbacks) = self.callbacks.upgrade() {
            callbacks
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.id);
        }
    }
}
