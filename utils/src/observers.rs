//! Synchronous fan-out of events to subscribed listeners.

use std::sync::{Arc, RwLock};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Listeners are invoked inline on the notifying thread, in subscription
/// order. Subscribing is possible through a shared reference, so a set can
/// live inside an `Arc`'d component.
pub struct ObserverSet<T: ?Sized> {
    listeners: RwLock<Vec<Listener<T>>>,
}

impl<T: ?Sized> ObserverSet<T> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) {
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(listener));
    }

    pub fn notify(&self, event: &T) {
        // Snapshot so a listener may subscribe without deadlocking.
        let listeners: Vec<Listener<T>> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for listener in &listeners {
            listener(event);
        }
    }

    pub fn len(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized> Default for ObserverSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notify_calls_all_listeners() {
        let counter = Arc::new(AtomicUsize::new(0));
        let set = ObserverSet::<u64>::new();
        let c1 = Arc::clone(&counter);
        set.subscribe(move |_| {
            c1.fetch_add(1, Ordering::SeqCst);
        });
        let c2 = Arc::clone(&counter);
        set.subscribe(move |v| {
            c2.fetch_add(*v as usize, Ordering::SeqCst);
        });
        set.notify(&10);
        assert_eq!(counter.load(Ordering::SeqCst), 11);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn notify_with_no_listeners_is_noop() {
        let set = ObserverSet::<()>::new();
        set.notify(&());
        assert!(set.is_empty());
    }
}
