//! Observable events
//!
//! `Event<T>` is a broadcast list of callbacks. Subscribers are invoked in
//! subscription order with the subscriber list unlocked, so a callback may
//! subscribe, unsubscribe or emit again without deadlocking.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, PoisonError};

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle returned by [`Event::subscribe`]
    pub struct SubscriptionId;
}

/// Shared dirty flag, set by a notification source and consumed by a poller
pub type DirtyFlag = Arc<AtomicBool>;

/// Create a dirty flag that starts out set, so the first poll always runs
pub fn dirty_flag() -> DirtyFlag {
    Arc::new(AtomicBool::new(true))
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// A broadcast event
pub struct Event<T> {
    subscribers: Mutex<SlotMap<SubscriptionId, Callback<T>>>,
}

impl<T> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Event<T> {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(SlotMap::with_key()),
        }
    }

    /// Register a callback invoked on every emit
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Arc::new(callback))
    }

    /// Remove a callback. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Invoke every subscriber with `value`
    pub fn emit(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            callback(value);
        }
    }

    /// Drop every subscriber
    pub fn clear(&self) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<T> std::fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
