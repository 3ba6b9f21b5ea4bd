//! Subscriber registry for single-threaded change notifications.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Handle returned by [`Listeners::add`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Slot<E> = (ListenerId, Rc<dyn Fn(&E)>);

/// A list of callbacks invoked with a borrowed event.
///
/// Notification iterates over a snapshot, so a listener may subscribe or
/// unsubscribe listeners, or trigger another notification, without a
/// `RefCell` double borrow.
pub struct Listeners<E: ?Sized> {
    slots: RefCell<Vec<Slot<E>>>,
    next_id: Cell<u64>,
}

impl<E: ?Sized> Listeners<E> {
    pub fn new() -> Self {
        Self {
            slots: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Registers a listener for all future notifications.
    pub fn add(&self, listener: impl Fn(&E) + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.slots.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was already gone.
    pub fn remove(&self, id: ListenerId) -> bool {
        let mut slots = self.slots.borrow_mut();
        let before = slots.len();
        slots.retain(|(slot, _)| *slot != id);
        slots.len() != before
    }

    /// Calls every registered listener with `event`.
    pub fn notify(&self, event: &E) {
        let snapshot: Vec<_> = self
            .slots
            .borrow()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.borrow().len()
    }
}

impl<E: ?Sized> Default for Listeners<E> {
    fn default() -> Self {
        Self::new()
    }
}
