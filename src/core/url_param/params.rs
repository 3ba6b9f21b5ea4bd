//! The URL query string as an externally mutable store.
//!
//! [`SearchParams`] is everything a [`super::UrlParam`] needs from its host:
//! read a key, replace the current history entry with one key changed, and
//! hear about changes made by anyone else.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use url::Url;

use crate::utils::listeners::{ListenerId, Listeners};
use crate::utils::url::{param_values, with_param};

/// Read/replace access to the query parameters of the current URL.
pub trait SearchParams {
    /// All values of `name`, in URL order. Empty when absent.
    fn get_all(&self, name: &str) -> Vec<String>;

    /// Set `name` to `value` (or remove it for `None`) by replacing the
    /// current history entry. Never pushes a new entry.
    fn replace(&self, name: &str, value: Option<&str>);

    /// Call `listener` after every change to the URL, including changes
    /// made through [`SearchParams::replace`].
    fn subscribe(&self, listener: Rc<dyn Fn()>) -> ListenerId;

    /// Remove a listener added by [`SearchParams::subscribe`].
    fn unsubscribe(&self, id: ListenerId);
}

// ============================================================================
// MemoryLocation
// ============================================================================

/// An in-memory URL with history-replace semantics.
///
/// Used in tests and wherever there is no browser location to bind to.
pub struct MemoryLocation {
    url: RefCell<Url>,
    replaces: Cell<usize>,
    listeners: Listeners<()>,
}

impl MemoryLocation {
    pub fn new(href: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            url: RefCell::new(Url::parse(href)?),
            replaces: Cell::new(0),
            listeners: Listeners::new(),
        })
    }

    /// Current URL as a string.
    pub fn href(&self) -> String {
        self.url.borrow().to_string()
    }

    /// Move to `href` as if the user navigated or another module rewrote
    /// the URL. Subscribers are notified.
    pub fn navigate(&self, href: &str) -> Result<(), url::ParseError> {
        let next = Url::parse(href)?;
        *self.url.borrow_mut() = next;
        self.listeners.notify(&());
        Ok(())
    }

    /// Number of history replaces performed so far.
    pub fn replace_count(&self) -> usize {
        self.replaces.get()
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl SearchParams for MemoryLocation {
    fn get_all(&self, name: &str) -> Vec<String> {
        param_values(&self.url.borrow(), name)
    }

    fn replace(&self, name: &str, value: Option<&str>) {
        let next = with_param(&self.url.borrow(), name, value);
        *self.url.borrow_mut() = next;
        self.replaces.set(self.replaces.get() + 1);
        self.listeners.notify(&());
    }

    fn subscribe(&self, listener: Rc<dyn Fn()>) -> ListenerId {
        self.listeners.add(move |_| listener())
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}

// ============================================================================
// BrowserLocation
// ============================================================================

/// `window.location` plus `History.replaceState`.
///
/// Subscribers hear about back/forward navigation (`popstate`) and about
/// replaces made through this instance. Create one per page and share it.
pub struct BrowserLocation {
    listeners: Rc<Listeners<()>>,
}

impl BrowserLocation {
    pub fn new() -> Self {
        let listeners = Rc::new(Listeners::new());

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use wasm_bindgen::prelude::Closure;

            let notify = listeners.clone();
            let closure = Closure::wrap(Box::new(move || {
                notify.notify(&());
            }) as Box<dyn Fn()>);

            if let Some(window) = crate::utils::dom::window() {
                let _ = window
                    .add_event_listener_with_callback("popstate", closure.as_ref().unchecked_ref());
            }

            // Lives as long as the page
            closure.forget();
        }

        Self { listeners }
    }

    fn current(&self) -> Option<Url> {
        crate::utils::dom::current_href().and_then(|href| Url::parse(&href).ok())
    }
}

impl Default for BrowserLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchParams for BrowserLocation {
    fn get_all(&self, name: &str) -> Vec<String> {
        self.current()
            .map(|url| param_values(&url, name))
            .unwrap_or_default()
    }

    fn replace(&self, name: &str, value: Option<&str>) {
        let Some(url) = self.current() else {
            return;
        };
        let next = with_param(&url, name, value);
        if crate::utils::dom::replace_url(next.as_str()) {
            self.listeners.notify(&());
        }
    }

    fn subscribe(&self, listener: Rc<dyn Fn()>) -> ListenerId {
        self.listeners.add(move |_| listener())
    }

    fn unsubscribe(&self, id: ListenerId) {
        self.listeners.remove(id);
    }
}
