//! Framework-independent coordination primitives.
//!
//! This module provides:
//! - [`RequestCache`] memoized, de-duplicated read-only requests
//! - [`QueryRunner`] last-started-wins async invocation with status tracking
//! - [`UrlParam`] debounced two-way binding to a URL query parameter

pub mod cache;
pub mod error;
pub mod fingerprint;
pub mod query;
pub mod transport;
pub mod url_param;

pub use cache::{CacheStats, Payload, RequestCache, decode};
pub use error::FetchError;
pub use fingerprint::Fingerprint;
pub use query::{Completion, Generation, QueryRunner, QueryState, QueryStatus};
pub use transport::{HttpRequest, HttpResponse, HttpTransport};
pub use crate::utils::listeners::ListenerId;
pub use url_param::{
    ArrayCodec, BoolCodec, BrowserLocation, Codec, MemoryLocation, NumberCodec, SearchParams,
    StringCodec, SyncEvent, UrlParam,
};
