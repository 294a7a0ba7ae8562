//! Synchronous observer channels
//!
//! Every notification in the panel core (delete, release, callback, create,
//! property changes) is an [`Event`]: an ordered list of listener closures
//! invoked on the caller's thread in registration order.
//!
//! # Dispatch rules
//!
//! - Listeners added while an emission is running are first called by the next emission.
//! - Listeners removed while an emission is running are not called afterwards.
//! - A listener that re-triggers its own event is not re-entered; the nested call skips it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle returned by [`Event::subscribe`], used for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

type Listener<T> = Rc<RefCell<dyn FnMut(&T)>>;

/// Ordered set of listeners for one notification
pub struct Event<T: 'static> {
    listeners: RefCell<Vec<(ListenerId, Listener<T>)>>,
    next_id: Cell<u64>,
}

impl<T: 'static> Event<T> {
    pub fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Register a listener, returns its id for later removal
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: FnMut(&T) + 'static,
    {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let listener: Listener<T> = Rc::new(RefCell::new(listener));
        self.listeners.borrow_mut().push((id, listener));
        id
    }

    /// Remove a listener by id
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        match listeners.iter().position(|(lid, _)| *lid == id) {
            Some(pos) => {
                listeners.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Drop every listener
    pub fn clear(&self) {
        self.listeners.borrow_mut().clear();
    }

    pub fn contains(&self, id: ListenerId) -> bool {
        self.listeners.borrow().iter().any(|(lid, _)| *lid == id)
    }

    pub fn len(&self) -> usize {
        self.listeners.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Invoke every listener with `arg`, in registration order
    pub fn emit(&self, arg: &T) {
        // Listeners may subscribe or unsubscribe while we iterate, so work on
        // a snapshot and never hold the list borrowed during a call.
        let snapshot: Vec<(ListenerId, Listener<T>)> = self.listeners.borrow().clone();

        for (id, listener) in snapshot {
            if !self.contains(id) {
                continue;
            }
            match listener.try_borrow_mut() {
                Ok(mut call) => (&mut *call)(arg),
                Err(_) => tracing::warn!(listener = id.0, "Skipping re-entrant listener"),
            }
        }
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event").field("listeners", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_in_registration_order() {
        let event = Event::<u32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let log = log.clone();
            event.subscribe(move |value: &u32| log.borrow_mut().push(format!("{}{}", tag, value)));
        }

        event.emit(&7);
        assert_eq!(*log.borrow(), vec!["a7", "b7", "c7"]);
    }

    #[test]
    fn test_unsubscribe() {
        let event = Event::<()>::new();
        let hits = Rc::new(Cell::new(0));

        let h = hits.clone();
        let id = event.subscribe(move |_| h.set(h.get() + 1));
        event.emit(&());
        assert!(event.unsubscribe(id));
        assert!(!event.unsubscribe(id));
        event.emit(&());

        assert_eq!(hits.get(), 1);
        assert!(event.is_empty());
    }

    #[test]
    fn test_listener_removed_during_emit_is_skipped() {
        let event = Rc::new(Event::<()>::new());
        let hits = Rc::new(Cell::new(0));
        let second = Rc::new(Cell::new(None));

        let (ev, sec) = (event.clone(), second.clone());
        event.subscribe(move |_| {
            if let Some(id) = sec.get() {
                ev.unsubscribe(id);
            }
        });
        let h = hits.clone();
        second.set(Some(event.subscribe(move |_| h.set(h.get() + 1))));

        event.emit(&());
        assert_eq!(hits.get(), 0);
        assert_eq!(event.len(), 1);
    }

    #[test]
    fn test_listener_added_during_emit_runs_next_time() {
        let event = Rc::new(Event::<()>::new());
        let hits = Rc::new(Cell::new(0));

        let (ev, h) = (event.clone(), hits.clone());
        let added = Cell::new(false);
        event.subscribe(move |_| {
            if !added.replace(true) {
                let h = h.clone();
                ev.subscribe(move |_| h.set(h.get() + 1));
            }
        });

        event.emit(&());
        assert_eq!(hits.get(), 0);
        event.emit(&());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_reentrant_emit_does_not_recurse() {
        let event = Rc::new(Event::<u32>::new());
        let calls = Rc::new(Cell::new(0));

        let (ev, c) = (event.clone(), calls.clone());
        event.subscribe(move |depth: &u32| {
            c.set(c.get() + 1);
            if *depth == 0 {
                ev.emit(&1);
            }
        });

        event.emit(&0);
        assert_eq!(calls.get(), 1);
    }
}
