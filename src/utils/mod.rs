//! Browser glue and small shared helpers.
//!
//! Provides:
//! - [`FetchTransport`] - `window.fetch` as an [`crate::core::HttpTransport`]
//! - [`dom`] - window, location and history access
//! - [`url`] - request URL building and query canonicalization
//! - [`task`] - spawning and timers for the current target

pub mod dom;
mod fetch;
pub mod listeners;
pub mod task;
pub mod url;

pub use fetch::FetchTransport;
