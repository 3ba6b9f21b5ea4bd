//! URL parameter as a signal.

use std::rc::Rc;

use leptos::prelude::*;

use crate::core::{Codec, SearchParams, UrlParam};

/// A signal kept in step with the URL query parameter `name`.
///
/// Writing the signal schedules a debounced URL replace; back/forward
/// navigation and other writers of the URL update the signal. The binding
/// lives as long as the current reactive owner and is released with it.
pub fn use_url_param<C: Codec>(
    params: Rc<dyn SearchParams>,
    name: &str,
    codec: C,
    initial: C::Value,
) -> RwSignal<C::Value, LocalStorage> {
    let binding = UrlParam::new(params, name, codec, initial);
    let signal = RwSignal::new_local(binding.get());

    let id = binding.subscribe(move |value| {
        let stale = signal
            .try_with_untracked(|current| current != value)
            .unwrap_or(false);
        if stale {
            let _ = signal.try_set(value.clone());
        }
    });

    let binding = StoredValue::new_local(binding);
    on_cleanup(move || {
        let _ = binding.try_with_value(|binding| binding.unsubscribe(id));
    });

    Effect::new(move |_| {
        let value = signal.get();
        let _ = binding.try_with_value(|binding| binding.set(value));
    });

    signal
}
