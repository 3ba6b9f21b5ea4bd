//! Data-layer primitives for a map dashboard.
//!
//! - [`crate::core::RequestCache`] memoizes read-only requests and joins concurrent
//!   identical ones into a single network call.
//! - [`crate::core::QueryRunner`] runs an async function and exposes its status,
//!   keeping only the outcome of the most recently started call.
//! - [`crate::core::UrlParam`] keeps a typed value and a URL query parameter in
//!   step, with debounced history replaces.
//!
//! [`api`] builds the dashboard endpoints on top of the cache, and [`hooks`]
//! exposes the primitives to Leptos components as signals.

pub mod api;
pub mod config;
pub mod core;
pub mod hooks;
pub mod utils;

pub use crate::api::DashboardApi;
pub use crate::core::{FetchError, QueryRunner, RequestCache, UrlParam};
