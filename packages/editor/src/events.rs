//! # Notification Channels
//!
//! Explicit publish/subscribe channels, one per notification kind, consumed
//! by rendering, auto-save, and state-indicator collaborators.
//!
//! Delivery is synchronous and ordered: handlers run on the event loop in
//! subscription order, nothing is reordered or dropped. Handlers receive ids
//! and values, never live node references, so a subscriber can outlive any
//! node it hears about. The session is single-threaded and cooperative, so
//! handlers are plain `Rc<dyn Fn>` closures with id-based unsubscribe.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type HandlerId = u64;

/// Informational channel: subscribers observe, they cannot veto
pub struct EventChannel<T> {
    handlers: RefCell<Vec<(HandlerId, Rc<dyn Fn(&T)>)>>,
    next_id: Cell<HandlerId>,
}

impl<T> EventChannel<T> {
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub fn subscribe(&self, handler: impl Fn(&T) + 'static) -> HandlerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    /// Returns false if the handler was already gone
    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }

    pub fn emit(&self, event: &T) {
        // Snapshot so handlers may subscribe/unsubscribe re-entrantly
        let snapshot: Vec<Rc<dyn Fn(&T)>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        for handler in snapshot {
            handler(event);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }
}

impl<T> Default for EventChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancelable channel: the "before" half of a before/after pair. Every
/// handler runs; the event proceeds only if none vetoed it.
pub struct CancelableChannel<T> {
    handlers: RefCell<Vec<(HandlerId, Rc<dyn Fn(&T) -> bool>)>>,
    next_id: Cell<HandlerId>,
}

impl<T> CancelableChannel<T> {
    pub fn new() -> Self {
        Self {
            handlers: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    /// Handlers return false to cancel the pending operation
    pub fn subscribe(&self, handler: impl Fn(&T) -> bool + 'static) -> HandlerId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers.borrow_mut().push((id, Rc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|(hid, _)| *hid != id);
        handlers.len() != before
    }

    /// Returns true when the operation is allowed to proceed
    pub fn emit(&self, event: &T) -> bool {
        let snapshot: Vec<Rc<dyn Fn(&T) -> bool>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        let mut allowed = true;
        for handler in snapshot {
            allowed &= handler(event);
        }
        allowed
    }
}

impl<T> Default for CancelableChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Payload for before-undo/before-redo notifications
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEvent {
    /// Label of the transaction about to be reverted/reapplied
    pub transaction: Option<String>,
}

/// What kind of edit produced a modified notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifiedKind {
    Commit,
    Undo,
    Redo,
}

/// Payload for document-modified notifications
#[derive(Debug, Clone, PartialEq)]
pub struct ModifiedEvent {
    pub kind: ModifiedKind,
    pub transaction: Option<String>,
}

/// Payload for selection-changing/changed notifications
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionEvent {
    pub old_id: Option<String>,
    pub new_id: Option<String>,
}

/// All channels an editing session exposes to collaborators
#[derive(Default)]
pub struct SessionEvents {
    pub before_undo: CancelableChannel<HistoryEvent>,
    pub before_redo: CancelableChannel<HistoryEvent>,
    pub modified: EventChannel<ModifiedEvent>,
    pub selection_changing: CancelableChannel<SelectionEvent>,
    pub selection_changed: EventChannel<SelectionEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_ordered_delivery_and_unsubscribe() {
        let channel = EventChannel::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let seen_a = Rc::clone(&seen);
        let a = channel.subscribe(move |v| seen_a.borrow_mut().push(("a", *v)));
        let seen_b = Rc::clone(&seen);
        let _b = channel.subscribe(move |v| seen_b.borrow_mut().push(("b", *v)));

        channel.emit(&1);
        assert!(channel.unsubscribe(a));
        assert!(!channel.unsubscribe(a));
        channel.emit(&2);

        assert_eq!(*seen.borrow(), vec![("a", 1), ("b", 1), ("b", 2)]);
    }

    #[test]
    fn test_cancelable_channel_vetoes() {
        let channel = CancelableChannel::<&str>::new();
        assert!(channel.emit(&"no subscribers"));

        let ran = Rc::new(Cell::new(0));
        let ran_a = Rc::clone(&ran);
        channel.subscribe(move |_| {
            ran_a.set(ran_a.get() + 1);
            false
        });
        let ran_b = Rc::clone(&ran);
        channel.subscribe(move |_| {
            ran_b.set(ran_b.get() + 1);
            true
        });

        // Vetoed, but every handler still heard the event
        assert!(!channel.emit(&"evt"));
        assert_eq!(ran.get(), 2);
    }
}
