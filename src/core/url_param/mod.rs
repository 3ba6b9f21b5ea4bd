//! Two-way binding between a typed value and one URL query parameter.
//!
//! Both directions feed a single reconciliation function:
//!
//! - **URL changed**: read the raw parameter (repeated keys joined with
//!   commas). Changes to other keys and removal of this one are ignored.
//!   If the raw value equals the current value re-stringified, it is the
//!   echo of our own write and is ignored too. Otherwise a parsed value
//!   that [`Codec::is_set`] is adopted.
//! - **Value changed**: after a quiet period (200 ms by default) the value
//!   is stringified and written with a history replace. A value equal to
//!   the current parameter is not rewritten. An unset value removes the key
//!   instead of writing `name=` or `name=0`.
//!
//! Because `stringify` may be lossy, the echo check compares strings after
//! one round trip, which is what keeps the two directions from oscillating.

mod codec;
mod params;

pub use codec::{ArrayCodec, BoolCodec, Codec, NumberCodec, StringCodec};
pub use params::{BrowserLocation, MemoryLocation, SearchParams};

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use tracing::{debug, trace};

use crate::config::{ARRAY_PARAM_SEPARATOR, URL_SYNC_DEBOUNCE_MS};
use crate::utils::listeners::{ListenerId, Listeners};
use crate::utils::task;

/// What triggered a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    /// The URL changed, possibly because of our own write.
    UrlChanged,
    /// The in-memory value changed.
    ValueChanged,
}

struct Inner<C: Codec> {
    name: String,
    codec: C,
    value: RefCell<C::Value>,
    params: Rc<dyn SearchParams>,
    debounce: Cell<Duration>,
    /// Raw parameter as last observed, to tell our key's changes apart
    /// from changes to sibling keys.
    seen: RefCell<Option<String>>,
    /// Bumped on every value change; only the latest scheduled write fires.
    pending: Cell<u64>,
    listeners: Listeners<C::Value>,
    /// Our listener on `params`, removed when the binding goes away.
    subscription: Cell<Option<ListenerId>>,
}

/// A value mirrored against the URL query parameter `name`.
///
/// Cloning shares the binding. Dropping the last clone unsubscribes it
/// from the URL; a write still pending at that point is abandoned.
pub struct UrlParam<C: Codec> {
    inner: Rc<Inner<C>>,
}

impl<C: Codec> Clone for UrlParam<C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<C: Codec> UrlParam<C> {
    /// Bind `name` to a value starting at `initial`.
    ///
    /// The current URL is read immediately, so an existing parameter wins
    /// over `initial`. The initial value itself is not written to the URL.
    pub fn new(
        params: Rc<dyn SearchParams>,
        name: impl Into<String>,
        codec: C,
        initial: C::Value,
    ) -> Self {
        let inner = Rc::new(Inner {
            name: name.into(),
            codec,
            value: RefCell::new(initial),
            params: params.clone(),
            debounce: Cell::new(Duration::from_millis(URL_SYNC_DEBOUNCE_MS)),
            seen: RefCell::new(None),
            pending: Cell::new(0),
            listeners: Listeners::new(),
            subscription: Cell::new(None),
        });

        let weak = Rc::downgrade(&inner);
        let id = params.subscribe(Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                Inner::reconcile(&inner, SyncEvent::UrlChanged);
            }
        }));
        inner.subscription.set(Some(id));

        let raw = inner.raw();
        Inner::adopt(&inner, raw);
        Self { inner }
    }

    /// Override the quiet period before writes reach the URL.
    pub fn with_debounce(self, debounce: Duration) -> Self {
        self.inner.debounce.set(debounce);
        self
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn get(&self) -> C::Value {
        self.inner.value.borrow().clone()
    }

    /// Borrow the value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&C::Value) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Change the value. Equal values are ignored; anything else notifies
    /// subscribers and schedules a debounced URL write.
    pub fn set(&self, value: C::Value) {
        Inner::assign(&self.inner, value);
    }

    /// Modify the value in place, with the same effects as [`UrlParam::set`].
    pub fn update(&self, f: impl FnOnce(&mut C::Value)) {
        let mut next = self.get();
        f(&mut next);
        self.set(next);
    }

    /// Call `listener` with the new value after every change, whichever
    /// side it came from.
    pub fn subscribe(&self, listener: impl Fn(&C::Value) + 'static) -> ListenerId {
        self.inner.listeners.add(listener)
    }

    /// Remove a listener added by [`UrlParam::subscribe`].
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.remove(id)
    }

    /// Run one reconciliation step by hand.
    pub fn reconcile(&self, event: SyncEvent) {
        Inner::reconcile(&self.inner, event);
    }
}

impl<C: Codec> Drop for Inner<C> {
    fn drop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.params.unsubscribe(id);
        }
    }
}

impl<C: Codec> Inner<C> {
    fn reconcile(this: &Rc<Self>, event: SyncEvent) {
        match event {
            SyncEvent::UrlChanged => Self::adopt_from_url(this),
            SyncEvent::ValueChanged => Self::schedule_write(this),
        }
    }

    /// Raw parameter, repeated keys joined. `None` when absent.
    fn raw(&self) -> Option<String> {
        let values = self.params.get_all(&self.name);
        if values.is_empty() {
            None
        } else {
            Some(values.join(ARRAY_PARAM_SEPARATOR.to_string().as_str()))
        }
    }

    fn adopt_from_url(this: &Rc<Self>) {
        let raw = this.raw();
        if *this.seen.borrow() == raw {
            return;
        }
        Self::adopt(this, raw);
    }

    fn adopt(this: &Rc<Self>, raw: Option<String>) {
        *this.seen.borrow_mut() = raw.clone();
        let Some(raw) = raw else {
            return;
        };

        let current = this.codec.stringify(&this.value.borrow());

        if raw == current {
            trace!(name = %this.name, %raw, "url change is an echo; ignored");
            return;
        }

        let parsed = this.codec.parse(&raw);
        if !this.codec.is_set(&parsed) {
            trace!(name = %this.name, %raw, "url value unset or malformed; ignored");
            return;
        }

        Self::assign(this, parsed);
    }

    fn assign(this: &Rc<Self>, value: C::Value) {
        if *this.value.borrow() == value {
            return;
        }
        *this.value.borrow_mut() = value.clone();
        this.listeners.notify(&value);
        Self::reconcile(this, SyncEvent::ValueChanged);
    }

    fn schedule_write(this: &Rc<Self>) {
        let generation = this.pending.get() + 1;
        this.pending.set(generation);

        let weak: Weak<Self> = Rc::downgrade(this);
        let debounce = this.debounce.get();
        task::spawn_local(async move {
            task::sleep(debounce).await;
            if let Some(inner) = weak.upgrade()
                && inner.pending.get() == generation
            {
                inner.write_url();
            }
        });
    }

    fn write_url(&self) {
        let target = {
            let value = self.value.borrow();
            let next = self.codec.stringify(&value);
            (self.codec.is_set(&value) && !next.is_empty()).then_some(next)
        };

        if self.raw() == target {
            return;
        }

        debug!(name = %self.name, value = ?target, "replacing url parameter");
        self.params.replace(&self.name, target.as_deref());
    }
}
