//! DOM and Web API utility functions.
//!
//! Provides safe, consistent access to the browser location and history.

use wasm_bindgen::JsValue;
use web_sys::Window;

/// Get the browser window object.
#[inline]
pub fn window() -> Option<Window> {
    web_sys::window()
}

/// Get the full current URL (`location.href`).
pub fn current_href() -> Option<String> {
    window()?.location().href().ok()
}

/// Replace the current history entry's URL without adding a new entry.
///
/// Returns `false` (and logs a console warning) if the browser refused,
/// e.g. for a cross-origin URL.
pub fn replace_url(href: &str) -> bool {
    let Some(window) = window() else {
        return false;
    };

    match window.history() {
        Ok(history) => match history.replace_state_with_url(&JsValue::NULL, "", Some(href)) {
            Ok(()) => true,
            Err(err) => {
                web_sys::console::warn_2(&"history.replaceState failed:".into(), &err);
                false
            }
        },
        Err(err) => {
            web_sys::console::warn_2(&"history unavailable:".into(), &err);
            false
        }
    }
}
