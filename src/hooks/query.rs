//! Query state as signals.

use std::fmt::Display;

use leptos::prelude::*;

use crate::core::{QueryRunner, QueryStatus};

/// Read-only signals tracking one [`QueryRunner`].
pub struct QuerySignals<T: 'static> {
    pub status: ReadSignal<QueryStatus>,
    /// Held in local storage, so `T` need not be `Send`.
    pub data: ReadSignal<T, LocalStorage>,
    pub error: ReadSignal<Option<String>>,
}

impl<T: 'static> Clone for QuerySignals<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for QuerySignals<T> {}

impl<T: 'static> QuerySignals<T> {
    /// `true` while the latest run is in flight.
    pub fn is_loading(&self) -> Signal<bool> {
        let status = self.status;
        Signal::derive(move || status.get() == QueryStatus::Loading)
    }
}

/// Mirror `runner`'s status, data and error into signals.
///
/// The subscription on `runner` is removed when the current reactive
/// owner is cleaned up.
pub fn use_query<A, T, E>(runner: &QueryRunner<A, T, E>) -> QuerySignals<T>
where
    A: 'static,
    T: Clone + 'static,
    E: Display + 'static,
{
    let state = runner.state();
    let status = RwSignal::new(state.status);
    let data = RwSignal::new_local(state.data);
    let error = RwSignal::new(state.error);

    let id = runner.subscribe(move |state| {
        let _ = status.try_set(state.status);
        let _ = data.try_set(state.data.clone());
        let _ = error.try_set(state.error.clone());
    });

    let runner = StoredValue::new_local(runner.clone());
    on_cleanup(move || {
        let _ = runner.try_with_value(|runner| runner.unsubscribe(id));
    });

    QuerySignals {
        status: status.read_only(),
        data: data.read_only(),
        error: error.read_only(),
    }
}
