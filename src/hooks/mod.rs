//! Leptos bindings for the core primitives.
//!
//! The primitives know nothing about reactivity; these hooks mirror their
//! state into signals so components can read it like any other signal.

mod query;
mod url_param;

pub use query::{QuerySignals, use_query};
pub use url_param::use_url_param;
