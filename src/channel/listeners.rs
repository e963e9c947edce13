//! Event listener registry
//!
//! Listeners on a shared connection belong to individual handles, but the
//! connection dispatches to all of them. Registration hands back a
//! [`Subscription`] that removes exactly that listener when dropped, so no
//! sharer can disturb another sharer's listeners.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;

/// Callback invoked with an inbound event's payload
pub type EventCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Per-connection listener registry
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<String, Vec<(u64, EventCallback)>>>,
}

impl ListenerRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a callback for an event; returns its subscription
    pub(crate) fn add(self: &Arc<Self>, event: &str, callback: EventCallback) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners
            .entry(event.to_string())
            .or_default()
            .push((id, callback));

        Subscription {
            registry: Arc::downgrade(self),
            event: event.to_string(),
            id,
        }
    }

    /// Dispatch an event payload to every listener registered for it
    ///
    /// Callbacks run outside the lock so a callback may itself subscribe or
    /// unsubscribe without deadlocking.
    pub(crate) fn dispatch(&self, event: &str, data: &Value) {
        let callbacks: Vec<EventCallback> = {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            match listeners.get(event) {
                Some(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
                None => return,
            }
        };

        for callback in callbacks {
            callback(data);
        }
    }

    /// Number of listeners currently registered for an event
    pub(crate) fn count(&self, event: &str) -> usize {
        let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.get(event).map(Vec::len).unwrap_or(0)
    }

    fn remove(&self, event: &str, id: u64) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entries) = listeners.get_mut(event) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                listeners.remove(event);
            }
        }
    }
}

/// Handle to one registered listener
///
/// The listener stays registered for the lifetime of this object; dropping
/// it (or calling [`unsubscribe`](Subscription::unsubscribe)) removes the
/// listener. Outliving the connection is harmless — removal against a gone
/// registry is a no-op.
pub struct Subscription {
    registry: Weak<ListenerRegistry>,
    event: String,
    id: u64,
}

impl Subscription {
    /// Remove the listener now
    pub fn unsubscribe(self) {
        // Drop does the work
    }

    /// The event this subscription listens for
    pub fn event(&self) -> &str {
        &self.event
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(&self.event, self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("event", &self.event)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;

    fn counter_callback(count: Arc<AtomicUsize>) -> EventCallback {
        Arc::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_dispatch_reaches_listener() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let _sub = registry.add("result", counter_callback(Arc::clone(&count)));

        registry.dispatch("result", &json!({}));
        registry.dispatch("other", &json!({}));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let registry = ListenerRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));

        {
            let _sub = registry.add("result", counter_callback(Arc::clone(&count)));
            assert_eq!(registry.count("result"), 1);
        }

        assert_eq!(registry.count("result"), 0);
        registry.dispatch("result", &json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe_removes_only_its_listener() {
        let registry = ListenerRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let sub_a = registry.add("result", counter_callback(Arc::clone(&first)));
        let _sub_b = registry.add("result", counter_callback(Arc::clone(&second)));

        sub_a.unsubscribe();
        registry.dispatch("result", &json!({}));

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_may_subscribe_during_dispatch() {
        let registry = ListenerRegistry::new();
        let inner = Arc::clone(&registry);
        let late: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));
        let late_clone = Arc::clone(&late);

        let _sub = registry.add(
            "result",
            Arc::new(move |_| {
                let sub = inner.add("late", Arc::new(|_| {}));
                late_clone.lock().unwrap().push(sub);
            }),
        );

        // Must not deadlock
        registry.dispatch("result", &json!({}));
        assert_eq!(registry.count("late"), 1);
    }

    #[test]
    fn test_subscription_outlives_registry() {
        let registry = ListenerRegistry::new();
        let sub = registry.add("result", Arc::new(|_| {}));

        drop(registry);
        // Removal against a gone registry must not panic
        sub.unsubscribe();
    }
}
