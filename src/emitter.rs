//! Change notifications.
//!
//! An [`Emitter`] keeps a list of listeners keyed by [`SubscriptionId`].
//! Firing calls every listener in subscription order. A listener that panics
//! is logged and skipped; the remaining listeners still run. Subscription
//! ids come from one process-wide counter, so ids from different emitters
//! never collide.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

/// Token returned by [`Emitter::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

type Listener<T> = Box<dyn FnMut(&T)>;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

pub struct Emitter<T> {
    listeners: BTreeMap<SubscriptionId, Listener<T>>,
}

impl<T> Default for Emitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emitter")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl<T> Emitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: BTreeMap::new(),
        }
    }

    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&T) + 'static,
    {
        let id = SubscriptionId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        self.listeners.insert(id, Box::new(listener));
        id
    }

    /// Returns `false` if the id was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn has_listeners(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Drop every listener.
    pub fn clear(&mut self) {
        self.listeners.clear();
    }

    /// Deliver `event` to every listener. Returns the number of listeners
    /// that panicked.
    pub fn fire(&mut self, event: &T) -> usize {
        let mut failures = 0;
        for (id, listener) in self.listeners.iter_mut() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| listener(event)));
            if result.is_err() {
                failures += 1;
                warn!(subscription = id.0, "Listener panicked while handling an event");
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_fire_reaches_all_listeners_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut emitter = Emitter::new();
        let a = seen.clone();
        emitter.subscribe(move |v: &u32| a.borrow_mut().push(("a", *v)));
        let b = seen.clone();
        emitter.subscribe(move |v: &u32| b.borrow_mut().push(("b", *v)));

        assert_eq!(emitter.fire(&7), 0);
        assert_eq!(*seen.borrow(), vec![("a", 7), ("b", 7)]);
    }

    #[test]
    fn test_unsubscribe() {
        let count = Rc::new(RefCell::new(0));
        let mut emitter = Emitter::new();
        let c = count.clone();
        let id = emitter.subscribe(move |_: &()| *c.borrow_mut() += 1);

        emitter.fire(&());
        assert!(emitter.unsubscribe(id));
        assert!(!emitter.unsubscribe(id));
        emitter.fire(&());
        assert_eq!(*count.borrow(), 1);
        assert!(!emitter.has_listeners());
    }

    #[test]
    fn test_ids_unique_across_emitters() {
        let mut positions: Emitter<u32> = Emitter::new();
        let mut modes: Emitter<bool> = Emitter::new();
        let a = positions.subscribe(|_| {});
        let b = modes.subscribe(|_| {});
        assert_ne!(a, b);
        assert!(!positions.unsubscribe(b));
        assert!(positions.has_listeners());
    }

    #[test]
    fn test_panicking_listener_does_not_block_others() {
        let count = Rc::new(RefCell::new(0));
        let mut emitter = Emitter::new();
        emitter.subscribe(|_: &()| panic!("listener failure"));
        let c = count.clone();
        emitter.subscribe(move |_: &()| *c.borrow_mut() += 1);

        assert_eq!(emitter.fire(&()), 1);
        assert_eq!(*count.borrow(), 1);
        // The failing listener stays subscribed.
        assert_eq!(emitter.fire(&()), 1);
        assert_eq!(*count.borrow(), 2);
    }

    #[test]
    fn test_clear() {
        let mut emitter: Emitter<bool> = Emitter::default();
        emitter.subscribe(|_| {});
        emitter.clear();
        assert!(!emitter.has_listeners());
    }
}
